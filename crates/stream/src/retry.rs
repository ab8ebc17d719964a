//! Bounded retries for a single fetch.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Retry policy configuration.
///
/// A fetch is attempted once and then re-attempted up to `max_retries` times
/// while its error is retryable. There is no backoff beyond the fixed `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt (0 = no retries)
    pub max_retries: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Create a policy with a fixed number of retries and a fixed pause.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Check if more retries are allowed after `retries_so_far`.
    pub fn should_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the policy's
/// budget is spent. The last error is returned.
pub async fn retry<T, E, F, Fut, R>(policy: &RetryPolicy, mut op: F, is_retryable: R) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: core::fmt::Display,
{
    let mut retries = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && policy.should_retry(retries) => {
                retries += 1;
                debug!(
                    attempt = retries,
                    max_retries = policy.max_retries,
                    error = %err,
                    "fetch failed; retrying"
                );
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
            Err(err) => return Err(err),
        }
    }
}
