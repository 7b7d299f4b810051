//! Exponential backoff for transient failures.

use std::future::Future;
use std::time::Duration;

use crate::error::ValidationError;

/// Attempts made by the billing commands before giving up.
pub const MAX_ATTEMPTS: u32 = 6;

pub const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Backoff before retry number `attempt` (0-based): doubling, capped.
pub fn retry_backoff(initial: Duration, attempt: u32) -> Duration {
    initial
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_BACKOFF)
}

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is reached. `op` receives the 0-based attempt number.
pub async fn with_backoff<T, F, Fut>(
    max_attempts: u32,
    initial: Duration,
    mut op: F,
) -> Result<T, ValidationError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ValidationError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < max_attempts => {
                let backoff = retry_backoff(initial, attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = max_attempts,
                    backoff_secs = backoff.as_secs_f64(),
                    "{err}; retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
