//! Bounded retry with exponential backoff
//!
//! Only `ConcurrentModification` and `ResourceLocked` are retried; every
//! other failure, including persistence errors, is returned immediately.

use std::time::Duration;

use crate::errors::ExError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempts are exhausted. `op` receives the 1-based attempt number.
pub fn with_retry<T, F>(policy: &RetryPolicy, mut op: F) -> Result<T, ExError>
where
    F: FnMut(u32) -> Result<T, ExError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::debug!(
                    attempt,
                    err_code = err.code(),
                    delay_ms = delay.as_millis() as u64,
                    "retrying after retryable failure"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExErrorKind;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(35),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(35));
    }

    #[test]
    fn test_retries_concurrent_modification_until_success() {
        let result = with_retry(&fast(), |attempt| {
            if attempt < 3 {
                Err(ExError::new(ExErrorKind::ConcurrentModification))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), ExError> = with_retry(&fast(), |_| {
            calls += 1;
            Err(ExError::new(ExErrorKind::ResourceLocked))
        });
        assert_eq!(result.unwrap_err().kind(), ExErrorKind::ResourceLocked);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_persistence_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), ExError> = with_retry(&fast(), |_| {
            calls += 1;
            Err(ExError::new(ExErrorKind::Persistence))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
