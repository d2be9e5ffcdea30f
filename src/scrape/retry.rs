//! One retry/backoff policy shared by navigation, metadata and iframe resolution.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// `attempts` total tries; the wait after try `n` is `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
        }
    }

    #[must_use]
    pub const fn from_millis(attempts: u32, base_delay_ms: u64) -> Self {
        Self::new(attempts, Duration::from_millis(base_delay_ms))
    }

    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    const fn max_attempts(&self) -> u32 {
        if self.attempts == 0 { 1 } else { self.attempts }
    }
}

/// Runs `op(attempt)` until it succeeds or the policy is exhausted, returning the last error.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                debug!(attempt, error = %e, "Attempt failed, backing off");
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::from_millis(3, 3000);
        assert_eq!(policy.delay_for(1), Duration::from_millis(3000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(6000));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry(RetryPolicy::from_millis(3, 1), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(format!("attempt {attempt} failed"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_last_error() {
        let result: Result<(), String> = retry(RetryPolicy::from_millis(2, 1), |attempt| async move {
            Err(format!("boom {attempt}"))
        })
        .await;

        assert_eq!(result, Err("boom 2".to_string()));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry(RetryPolicy::from_millis(0, 1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("nothing") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
