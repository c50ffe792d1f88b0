//! Retry with exponential backoff for remote git operations.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

/// Longest wait between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How often and how patiently to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = try once)
    pub max_retries: u32,
    /// Wait before the first retry, doubled for every further one
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

/// Run `operation` until it succeeds, fails unrecoverably, or runs out of retries.
///
/// Errors for which [`MprError::is_recoverable`](crate::error::MprError::is_recoverable)
/// is false are returned at once.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                if attempts > 0 {
                    log::info!("{} succeeded after {} retry(ies)", operation_name, attempts);
                }
                return Ok(value);
            }
            Err(e) => {
                if !e.is_recoverable() {
                    log::error!("{} failed with unrecoverable error: {}", operation_name, e);
                    return Err(e);
                }
                if attempts >= policy.max_retries {
                    log::error!("{} failed after {} attempt(s)", operation_name, attempts + 1);
                    return Err(e);
                }

                attempts += 1;
                let wait = policy
                    .base_delay
                    .saturating_mul(2u32.saturating_pow(attempts - 1))
                    .min(MAX_BACKOFF);
                log::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:.1}s",
                    operation_name,
                    attempts,
                    policy.max_retries + 1,
                    e,
                    wait.as_secs_f64()
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}
