//! Retry logic with exponential backoff
//!
//! The request pipeline itself never retries. Callers that want to ride out
//! transient failures (timeouts, unreachable hosts, 5xx responses) wrap their
//! call in [`fetch_with_retry`], which backs off exponentially with optional
//! jitter.
//!
//! # Example
//!
//! ```no_run
//! use newsdesk::retry::fetch_with_retry;
//! use newsdesk::config::RetryConfig;
//! use newsdesk::error::ApiError;
//!
//! # async fn example() -> Result<(), ApiError> {
//! let config = RetryConfig::default();
//! let body = fetch_with_retry(&config, || async {
//!     Ok::<_, ApiError>("payload".to_string())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::ApiError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ApiError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// `max_attempts` counts retries, so the operation runs at most
/// `max_attempts + 1` times. Non-retryable errors are returned immediately.
pub async fn fetch_with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Fetch succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Fetch failed, retrying"
                );

                let wait = if config.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(wait).await;

                delay = scale_delay(delay, config.backoff_multiplier, config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Fetch failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Fetch failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Multiply `delay` by `factor`, saturating at `cap`
fn scale_delay(delay: Duration, factor: f64, cap: Duration) -> Duration {
    let secs = delay.as_secs_f64() * factor;
    if !secs.is_finite() || secs >= cap.as_secs_f64() {
        return cap;
    }
    Duration::try_from_secs_f64(secs).map_or(cap, |scaled| scaled.min(cap))
}

/// Stretch `delay` by a random factor in `[1.0, 2.0]`
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    scale_delay(delay, 1.0 + jitter_factor, Duration::MAX)
}
