//! Retry with exponential backoff for ledger HTTP calls.
//!
//! Only transport failures (connection errors, timeouts) are retried. A
//! response of any status is returned to the caller as is.

use std::future::Future;
use std::time::Duration;

/// Backoff schedule for ledger requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the initial request.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// Send a request, retrying transport errors according to `policy`.
///
/// `f` is called up to `max_retries + 1` times.
pub(crate) async fn retry_send<F, Fut>(
    policy: RetryPolicy,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..policy.max_retries {
        match f().await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    "ledger request failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
    f().await
}
