//! Bounded retry with exponential backoff for network calls.
//!
//! Every embedding and generation backend call goes through [`with_retry`].
//! Transient provider errors are retried; anything else surfaces at once.
//! The whole retrying call is bounded by the policy timeout: once it expires
//! the call is abandoned and [`LeseError::Timeout`] is returned.

use crate::config::NetworkSettings;
use crate::error::{LeseError, Result};
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Largest backoff exponent (initial * 2^5).
const MAX_BACKOFF_SHIFT: u32 = 5;

/// Retry and deadline settings for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each following one.
    pub initial_backoff: Duration,
    /// Deadline for the whole call, retries included.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from the `[network]` settings.
    pub fn from_settings(network: &NetworkSettings) -> Self {
        Self {
            max_retries: network.max_retries,
            initial_backoff: Duration::from_millis(network.initial_backoff_ms),
            timeout: Duration::from_secs(network.timeout_seconds),
        }
    }

    /// A policy that never retries.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            timeout,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff * (1u32 << attempt.min(MAX_BACKOFF_SHIFT))
    }
}

/// Run `call` until it succeeds, fails permanently, runs out of retries, or
/// the policy deadline passes.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = async {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < policy.max_retries => {
                    let delay = policy.backoff(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        operation,
                        attempt + 1,
                        policy.max_retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    };

    match tokio::time::timeout(policy.timeout, attempts).await {
        Ok(result) => result,
        Err(_) => Err(LeseError::Timeout {
            operation: operation.to_string(),
            seconds: policy.timeout.as_secs(),
        }),
    }
}

/// Classify a transport failure. Connection problems and per-request
/// timeouts are worth retrying; a body that fails to decode is not.
pub fn classify_transport(provider: &str, err: reqwest::Error) -> LeseError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        LeseError::transient(provider, err.to_string())
    } else {
        LeseError::permanent(provider, err.to_string())
    }
}

/// Classify a non-success HTTP status: 429 and 5xx are transient.
pub fn classify_status(provider: &str, status: StatusCode, body: &str) -> LeseError {
    let message = format!("HTTP {}: {}", status, body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        LeseError::transient(provider, message)
    } else {
        LeseError::permanent(provider, message)
    }
}
