//! Retrying HTTP fetcher
//!
//! This module handles all HTTP traffic of a crawl, including:
//! - Building the shared HTTP client (timeouts, compression)
//! - Handing out one-request-at-a-time [`FetchSession`]s
//! - Randomized inter-request delays and client identities
//! - Per-URL retry accounting shared by every session of a context
//!
//! Parallelism across chapters comes from running many sessions at once,
//! never from a single session issuing concurrent requests.

mod retry;
mod session;
mod user_agent;

pub use retry::{RetryDecision, RetryPolicy, RetryRegistry};
pub use session::{FetchOutcome, FetchSession, FetchedPage};
pub use user_agent::random_user_agent;

use crate::config::Settings;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Builds the HTTP client shared by all sessions of a crawler
///
/// # Arguments
///
/// * `timeout` - Whole-request timeout applied to every request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Factory for fetch sessions sharing one client and one retry registry
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    registry: Arc<RetryRegistry>,
    policy: RetryPolicy,
    delay: Option<(Duration, Duration)>,
}

impl Fetcher {
    pub fn new(client: Client, registry: Arc<RetryRegistry>, settings: &Settings) -> Self {
        Self {
            client,
            registry,
            policy: RetryPolicy::from_config(&settings.retry),
            delay: settings.crawl.delay_window(),
        }
    }

    /// Opens a session without cookies
    pub fn session(&self) -> FetchSession {
        self.session_with_cookie(None)
    }

    /// Opens a session that sends a static `Cookie` header with every request
    pub fn session_with_cookie(&self, cookie: Option<String>) -> FetchSession {
        FetchSession::new(
            self.client.clone(),
            Arc::clone(&self.registry),
            self.policy,
            self.delay,
            cookie,
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &Arc<RetryRegistry> {
        &self.registry
    }
}
