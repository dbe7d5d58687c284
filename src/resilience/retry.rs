//! # Retry Policy
//!
//! Exponential backoff around any fallible async gateway call.
//!
//! Only [`RequestError::Connectivity`] failures are retried. The delay before
//! retry `n` (zero-based) is `initial_delay * backoff_factor^n`, capped at
//! `max_delay`. After `max_retries` retries the last error is returned wrapped
//! in [`RequestError::RetriesExhausted`]; any other kind propagates at once
//! without consuming an attempt.

use crate::config::RetryConfig;
use crate::constants::defaults;
use crate::error::{RequestError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a call runs at most `max_retries + 1` times
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    /// Cap for exponential growth
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            initial_delay: Duration::from_millis(defaults::INITIAL_DELAY_MS),
            backoff_factor: defaults::BACKOFF_FACTOR,
            max_delay: Duration::from_millis(defaults::MAX_DELAY_MS),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_factor: config.backoff_factor,
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// Per-call bookkeeping; lives only for one `execute` invocation
#[derive(Debug, Default)]
pub struct RetryState {
    /// Retries performed so far
    pub attempt: u32,
    /// Delay used before the most recent retry
    pub delay: Duration,
    pub last_error: Option<RequestError>,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            initial_delay,
            backoff_factor,
            ..Self::default()
        }
    }

    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Backoff before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt.min(i32::MAX as u32) as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = RetryState::default();

        loop {
            match op().await {
                Ok(value) => {
                    if state.attempt > 0 {
                        debug!(
                            operation = %operation,
                            retries = state.attempt,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) if error.is_retryable() => {
                    if state.attempt >= self.max_retries {
                        warn!(
                            operation = %operation,
                            retries = state.attempt,
                            error = %error,
                            "Retry budget exhausted"
                        );
                        return Err(RequestError::RetriesExhausted {
                            operation: operation.to_string(),
                            attempts: state.attempt,
                            source: Box::new(error),
                        });
                    }

                    state.delay = self.delay_for(state.attempt);
                    state.attempt += 1;
                    warn!(
                        operation = %operation,
                        attempt = state.attempt,
                        max_retries = self.max_retries,
                        delay_ms = state.delay.as_millis() as u64,
                        error = %error,
                        "Retryable failure, backing off"
                    );
                    state.last_error = Some(error);
                    tokio::time::sleep(state.delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1), 2.0)
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), 2.0)
            .with_max_delay(Duration::from_millis(500));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(500));
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy, RetryPolicy::default());
        assert_eq!(policy.max_retries, 3);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .execute("fetch", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RequestError::connectivity("fetch", "connection reset"))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy(3)
            .execute("fetch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RequestError::connectivity("fetch", "timeout"))
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RequestError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_operation_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast_policy(3)
            .execute("fetch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RequestError::not_found("/missing.csv"))
            })
            .await;

        assert!(matches!(result, Err(RequestError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
