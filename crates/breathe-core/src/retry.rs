//! Retry with exponential backoff for remote calls

use std::time::Duration;

use indicatif::ProgressBar;

use crate::error::RemoteError;

/// How many times to retry a transient failure and how long to wait.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(2),
        }
    }

    /// Policy that retries without sleeping (tests)
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
        }
    }

    /// Exponential backoff: base, 2*base, 4*base, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Retry a fallible remote operation with exponential backoff.
///
/// Returns `Ok(T)` on first success, or the final `Err` on exhaustion / non-retryable error.
pub fn retry_with_backoff<T>(
    label: &str,
    policy: RetryPolicy,
    pb: &ProgressBar,
    mut attempt_fn: impl FnMut() -> Result<T, RemoteError>,
) -> Result<T, RemoteError> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < policy.max_retries && e.is_retryable() => {
                attempt += 1;
                let delay = policy.backoff(attempt);
                pb.set_message(format!("retry {attempt}/{}...", policy.max_retries));
                log::warn!(
                    "{label}: attempt {attempt}/{} failed: {e}, retrying in {delay:?}",
                    policy.max_retries
                );
                std::thread::sleep(delay);
            }
            Err(e) => {
                log::error!("{label}: failed permanently: {e}");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> RemoteError {
        RemoteError::Http {
            status: Some(503),
            message: "unavailable".into(),
        }
    }

    #[test]
    fn backoff_exponential() {
        let policy = RetryPolicy::new(5);
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = retry_with_backoff(
            "test",
            RetryPolicy::immediate(3),
            &ProgressBar::hidden(),
            || {
                calls += 1;
                if calls < 3 { Err(transient()) } else { Ok(calls) }
            },
        );
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff(
            "test",
            RetryPolicy::immediate(2),
            &ProgressBar::hidden(),
            || {
                calls += 1;
                Err(transient())
            },
        );
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn permanent_error_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with_backoff(
            "test",
            RetryPolicy::immediate(5),
            &ProgressBar::hidden(),
            || {
                calls += 1;
                Err(RemoteError::Http {
                    status: Some(403),
                    message: "denied".into(),
                })
            },
        );
        assert!(result.unwrap_err().is_auth_failure());
        assert_eq!(calls, 1);
    }
}
