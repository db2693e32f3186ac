//! Retry with exponential backoff for the connection phase
//!
//! Wraps request establishment only. Once a stream has yielded data the
//! request is never replayed, since the consumer may already have observed
//! partial output.

use std::future::Future;
use std::time::Duration;

use crate::error::AiError;

/// Backoff schedule for transient connection failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure
    pub max_retries: u32,
    /// Delay before the first retry, doubled each subsequent attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based)
    ///
    /// A provider-supplied retry-after hint overrides the computed backoff.
    fn delay_for(&self, attempt: u32, error: &AiError) -> Duration {
        if let Some(secs) = error.retry_after() {
            return Duration::from_secs(secs);
        }
        self.base_delay * 2_u32.saturating_pow(attempt)
    }
}

/// Run a connection attempt, retrying transient failures per the policy
///
/// Only errors that [`AiError::is_retryable`] reports as transient are
/// retried; anything else surfaces immediately. When attempts are
/// exhausted the last error is returned.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut attempt_fn: F) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut attempt = 0;
    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt, &e);
                tracing::warn!(
                    error = %e,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    ?delay,
                    "transient connection failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
