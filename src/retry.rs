//! Retry logic with attempt-indexed backoff and rate-limit waits
//!
//! Failures fall into three classes:
//! - transient failures are retried with a delay of `base_delay * 2^attempt + delay_offset`,
//!   bounded by [`RetryConfig::max_attempts`] total attempts
//! - rate-limit signals sleep exactly the mandated wait and retry without consuming an attempt
//! - anything else fails immediately
//!
//! # Example
//!
//! ```no_run
//! use chat_media_backup::retry::with_retry;
//! use chat_media_backup::config::RetryConfig;
//! use chat_media_backup::error::FetchError;
//!
//! # async fn example() -> Result<(), FetchError> {
//! let config = RetryConfig::default();
//! let bytes = with_retry(&config, |_attempt| async {
//!     // Your fetch here
//!     Ok::<u64, FetchError>(1024)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::FetchError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (connection reset, timeout, generic remote error) should return `true`.
/// Permanent failures should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;

    /// Wait mandated by the remote side
    ///
    /// When this returns `Some`, the operation is retried after exactly that wait and
    /// the attempt is not counted.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transient(_) => true,
            FetchError::RateLimited { .. } => true,
            FetchError::Fatal(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { wait } => Some(*wait),
            _ => None,
        }
    }
}

/// Delay before the retry that follows failed attempt `attempt` (0-based)
///
/// `base_delay * 2^attempt + delay_offset`, capped at `max_delay`.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    config
        .base_delay
        .saturating_mul(factor)
        .saturating_add(config.delay_offset)
        .min(config.max_delay)
}

/// Execute an async operation, retrying transient failures and honouring rate limits
///
/// The closure receives the 0-based index of the counted attempt it is running.
/// Rate-limited attempts are re-run with the same index.
///
/// Returns the successful result, or the last error once the error is permanent or
/// the attempt budget is spent.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                if let Some(wait) = e.retry_after() {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        wait_secs = wait.as_secs_f64(),
                        "Rate limited, waiting before retrying the same attempt"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }

                if e.is_retryable() && attempt + 1 < max_attempts {
                    let delay = backoff_delay(config, attempt);
                    let delay = if config.jitter {
                        add_jitter(delay)
                    } else {
                        delay
                    };
                    attempt += 1;

                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis(),
                        "Operation failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    continue;
                }

                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
