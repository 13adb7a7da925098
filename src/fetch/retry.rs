//! Per-URL retry accounting
//!
//! Failure counts are keyed by URL, not by session, so independently
//! created sessions that hit the same URL (pagination chains, repeated
//! searches) share one exhaustion budget.

use crate::config::{BackoffKind, RetryConfig};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Retry limits and delay growth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failures tolerated per URL; reaching it gives up
    pub max_attempts: u32,
    pub backoff: BackoffKind,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.effective_max_attempts(),
            backoff: config.backoff,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before re-issuing a request that has failed `failures` times
    ///
    /// Linear: base * failures. Exponential: base * 2^(failures - 1).
    /// Both are capped at `max_delay`.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let failures = failures.max(1);
        let delay = match self.backoff {
            BackoffKind::Linear => self.base_delay.saturating_mul(failures),
            BackoffKind::Exponential => {
                let factor = 2u32.saturating_pow(failures - 1);
                self.base_delay.saturating_mul(factor)
            }
        };
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// What to do after a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-issue the same request after `delay`
    Retry { failures: u32, delay: Duration },
    /// Budget exhausted; surface the failure
    GiveUp { failures: u32 },
}

/// Shared map of URL to failures so far
///
/// One registry lives per application context. The lock only guards map
/// access; backoff sleeping happens outside it.
#[derive(Debug, Default)]
pub struct RetryRegistry {
    failures: Mutex<HashMap<String, u32>>,
}

impl RetryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one failure of `url` and decides whether to retry
    pub fn record_failure(&self, url: &str, policy: &RetryPolicy) -> RetryDecision {
        let failures = {
            let mut map = self.failures.lock().unwrap_or_else(|e| e.into_inner());
            let count = map.entry(url.to_string()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };

        if failures < policy.max_attempts {
            RetryDecision::Retry {
                failures,
                delay: policy.delay_for(failures),
            }
        } else {
            RetryDecision::GiveUp { failures }
        }
    }

    /// Failures recorded so far for a URL
    pub fn failures(&self, url: &str) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// Number of URLs that have failed at least once
    pub fn tracked_urls(&self) -> usize {
        self.failures.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32, backoff: BackoffKind) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        }
    }

    #[test]
    fn test_exponential_delay() {
        let p = policy(10, BackoffKind::Exponential);
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
        assert_eq!(p.delay_for(4), Duration::from_millis(800));
        // Capped at max_delay
        assert_eq!(p.delay_for(5), Duration::from_millis(1000));
        assert_eq!(p.delay_for(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_linear_delay() {
        let p = policy(10, BackoffKind::Linear);
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(3), Duration::from_millis(300));
        assert_eq!(p.delay_for(20), Duration::from_millis(1000));
    }

    #[test]
    fn test_gives_up_at_ceiling() {
        let registry = RetryRegistry::new();
        let p = policy(3, BackoffKind::Linear);
        let url = "https://example.com/ch1";

        assert!(matches!(
            registry.record_failure(url, &p),
            RetryDecision::Retry { failures: 1, .. }
        ));
        assert!(matches!(
            registry.record_failure(url, &p),
            RetryDecision::Retry { failures: 2, .. }
        ));
        assert_eq!(
            registry.record_failure(url, &p),
            RetryDecision::GiveUp { failures: 3 }
        );
        assert_eq!(registry.failures(url), 3);
    }

    #[test]
    fn test_urls_counted_independently() {
        let registry = RetryRegistry::new();
        let p = policy(2, BackoffKind::Linear);

        registry.record_failure("https://example.com/a", &p);
        assert!(matches!(
            registry.record_failure("https://example.com/b", &p),
            RetryDecision::Retry { failures: 1, .. }
        ));
        assert_eq!(registry.tracked_urls(), 2);
        assert_eq!(registry.failures("https://example.com/c"), 0);
    }

    #[test]
    fn test_policy_from_config() {
        let config = RetryConfig {
            max_attempts: 0,
            backoff: BackoffKind::Linear,
            base_delay_ms: 250,
            max_delay_ms: 5000,
        };
        let p = RetryPolicy::from_config(&config);
        assert_eq!(p.max_attempts, crate::config::DEFAULT_MAX_ATTEMPTS);
        assert_eq!(p.base_delay, Duration::from_millis(250));
    }
}
