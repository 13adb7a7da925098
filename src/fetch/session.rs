//! Fetch sessions
//!
//! A session is a short-lived handle used for one batch of requests (one
//! search page set, one book page, one chapter with its continuation
//! pages). It issues at most one request at a time, spaces requests by the
//! configured delay window, and retries failures through the shared
//! [`RetryRegistry`].

use crate::fetch::retry::{RetryDecision, RetryPolicy, RetryRegistry};
use crate::{Result, ShioriError};
use rand::Rng;
use reqwest::header::{CONTENT_TYPE, COOKIE, USER_AGENT};
use reqwest::{Client, Response};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// A successfully fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: Url,
    /// Decoded response body
    pub body: String,
}

/// Result of a request that could be issued
///
/// Exhausting the retry budget is not an `Err`: it has already been logged
/// by the session, and each caller decides whether it is fatal.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Fetched(T),
    Exhausted {
        url: String,
        failures: u32,
        error: String,
    },
}

impl<T> FetchOutcome<T> {
    /// Converts an exhausted outcome into [`ShioriError::FetchExhausted`]
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Fetched(value) => Ok(value),
            Self::Exhausted {
                url,
                failures,
                error,
            } => Err(ShioriError::FetchExhausted {
                url,
                attempts: failures,
                message: error,
            }),
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Self::Fetched(value) => Some(value),
            Self::Exhausted { .. } => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

#[derive(Debug, Clone)]
enum Method {
    Get,
    PostForm(String),
}

/// One polite fetch session
pub struct FetchSession {
    client: Client,
    registry: Arc<RetryRegistry>,
    policy: RetryPolicy,
    delay: Option<(Duration, Duration)>,
    cookie: Option<String>,
    user_agent: &'static str,
    in_flight: Semaphore,
}

impl FetchSession {
    pub(crate) fn new(
        client: Client,
        registry: Arc<RetryRegistry>,
        policy: RetryPolicy,
        delay: Option<(Duration, Duration)>,
        cookie: Option<String>,
    ) -> Self {
        Self {
            client,
            registry,
            policy,
            delay,
            cookie,
            user_agent: super::user_agent::random_user_agent(),
            in_flight: Semaphore::new(1),
        }
    }

    /// Fetches a page with GET
    ///
    /// # Returns
    ///
    /// * `Ok(FetchOutcome::Fetched)` - The page body
    /// * `Ok(FetchOutcome::Exhausted)` - Every attempt failed; already logged
    /// * `Err(ShioriError::InvalidRequest)` - The request could not be built
    pub async fn get_text(&self, url: &str) -> Result<FetchOutcome<FetchedPage>> {
        self.execute(url, Method::Get, |response| async move {
            let url = response.url().clone();
            response.text().await.map(|body| FetchedPage { url, body })
        })
        .await
    }

    /// Submits an url-encoded form with POST and returns the result page
    pub async fn post_form(&self, url: &str, body: String) -> Result<FetchOutcome<FetchedPage>> {
        self.execute(url, Method::PostForm(body), |response| async move {
            let url = response.url().clone();
            response.text().await.map(|body| FetchedPage { url, body })
        })
        .await
    }

    /// Fetches raw bytes (cover images)
    pub async fn get_bytes(&self, url: &str) -> Result<FetchOutcome<Vec<u8>>> {
        self.execute(url, Method::Get, |response| async move {
            response.bytes().await.map(|bytes| bytes.to_vec())
        })
        .await
    }

    /// Runs one request through the retry loop
    ///
    /// Transport errors, non-2xx statuses and body read errors all count as
    /// a failure of the URL.
    async fn execute<T, F, Fut>(&self, url: &str, method: Method, read: F) -> Result<FetchOutcome<T>>
    where
        F: Fn(Response) -> Fut,
        Fut: Future<Output = std::result::Result<T, reqwest::Error>>,
    {
        let target = Url::parse(url).map_err(|e| ShioriError::InvalidRequest {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(ShioriError::InvalidRequest {
                url: url.to_string(),
                message: format!("unsupported scheme '{}'", target.scheme()),
            });
        }

        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|e| ShioriError::Task(e.to_string()))?;
        let key = target.to_string();

        // Already given up on by an earlier session; stay silent
        let failures = self.registry.failures(&key);
        if failures >= self.policy.max_attempts {
            tracing::debug!("Skipping {}, retry budget already spent", key);
            return Ok(FetchOutcome::Exhausted {
                url: key,
                failures,
                error: "retry budget already spent".to_string(),
            });
        }

        loop {
            self.pause().await;

            tracing::debug!("Requesting {}", key);
            let error = match self.build(&target, &method).send().await {
                Ok(response) if response.status().is_success() => match read(response).await {
                    Ok(value) => return Ok(FetchOutcome::Fetched(value)),
                    Err(e) => format!("failed to read body: {}", e),
                },
                Ok(response) => format!("HTTP {}", response.status()),
                Err(e) if e.is_builder() => {
                    return Err(ShioriError::InvalidRequest {
                        url: key,
                        message: e.to_string(),
                    });
                }
                Err(e) if e.is_timeout() => "request timeout".to_string(),
                Err(e) => e.to_string(),
            };

            match self.registry.record_failure(&key, &self.policy) {
                RetryDecision::Retry { failures, delay } => {
                    tracing::warn!(
                        "Request to {} failed ({}), retry {}/{} in {:?}",
                        key,
                        error,
                        failures,
                        self.policy.max_attempts.saturating_sub(1),
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp { failures } => {
                    tracing::error!(
                        "Giving up on {} after {} failures: {}",
                        key,
                        failures,
                        error
                    );
                    return Ok(FetchOutcome::Exhausted {
                        url: key,
                        failures,
                        error,
                    });
                }
            }
        }
    }

    fn build(&self, target: &Url, method: &Method) -> reqwest::RequestBuilder {
        let builder = match method {
            Method::Get => self.client.get(target.clone()),
            Method::PostForm(body) => self
                .client
                .post(target.clone())
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body.clone()),
        };

        let builder = builder.header(USER_AGENT, self.user_agent);
        match &self.cookie {
            Some(cookie) => builder.header(COOKIE, cookie.as_str()),
            None => builder,
        }
    }

    /// Sleeps for a random duration inside the configured delay window
    async fn pause(&self) {
        if let Some((min, max)) = self.delay {
            let wait = if max > min {
                rand::thread_rng().gen_range(min..=max)
            } else {
                max
            };
            tokio::time::sleep(wait).await;
        }
    }
}
