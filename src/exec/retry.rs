//! Fixed-delay retry

use crate::config::RetrySettings;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(settings.attempts, settings.delay())
    }
}

/// Value produced by the last attempt, and how many attempts were made
#[derive(Debug)]
pub struct Retried<R> {
    pub value: R,
    pub attempts: u32,
}

/// Run `op` until `should_retry` rejects its result or attempts run out
///
/// `op` receives the 1-based attempt number.
pub async fn retry<R, F, Fut, P>(policy: RetryPolicy, mut should_retry: P, mut op: F) -> Retried<R>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = R>,
    P: FnMut(&R) -> bool,
{
    let mut attempt = 1;
    loop {
        let value = op(attempt).await;
        if attempt >= policy.attempts || !should_retry(&value) {
            return Retried {
                value,
                attempts: attempt,
            };
        }
        warn!(
            "Attempt {}/{} failed, retrying in {}ms",
            attempt,
            policy.attempts,
            policy.delay.as_millis()
        );
        tokio::time::sleep(policy.delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_stops_on_success() {
        let calls = AtomicU32::new(0);
        let result = retry(
            RetryPolicy::new(3, Duration::ZERO),
            |r: &Result<u32, &str>| r.is_err(),
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err("AccessDeniedException")
                    } else {
                        Ok(attempt)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.value, Ok(2));
        assert_eq!(result.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let result = retry(
            RetryPolicy::new(3, Duration::from_millis(1)),
            |_: &bool| true,
            |_| async { false },
        )
        .await;
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn test_non_retryable_returns_immediately() {
        let result = retry(
            RetryPolicy::new(5, Duration::from_secs(60)),
            |_: &&str| false,
            |_| async { "fatal" },
        )
        .await;
        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }
}
