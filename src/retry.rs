//! Retry with exponential backoff as a reusable combinator.
//!
//! Any fallible async operation can be wrapped with a [`RetryPolicy`] and a
//! predicate deciding which errors are worth retrying. The fetcher uses this
//! for transient HTTP failures; extraction calls deliberately do not.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay applied after the given zero-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.mul_f64(self.multiplier.powi(attempt as i32));
        scaled.min(self.max_delay)
    }
}

/// Runs `op` up to `policy.max_attempts` times, sleeping between attempts
/// according to the backoff schedule. Errors rejected by `is_retryable` are
/// returned immediately; otherwise the last error is returned once the
/// attempt budget is exhausted. No sleep follows the final attempt.
pub async fn retry_with_policy<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying after delay"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
