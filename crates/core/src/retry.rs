//! Bounded exponential backoff for fallible async operations.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Backoff schedule for [`with_retry`].
///
/// The wait before retry `n` (1-based) is `base_delay * backoff_factor^(n-1)`,
/// capped at `max_delay`. With the defaults an operation runs at most four
/// times, waiting 100ms, 200ms and 400ms between attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to the wait after every retry.
    pub backoff_factor: u32,
    /// Upper bound for a single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            backoff_factor: 2,
            max_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Wait before the given retry (1-based).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let multiplier = self.backoff_factor.saturating_pow(exponent);
        self.base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }

    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Source of waiting time, swappable for a recording fake in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returned when every attempt failed.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed after {attempts} attempts: {source}")]
pub struct RetryError<E: std::error::Error + 'static> {
    pub operation: &'static str,
    pub attempts: u32,
    #[source]
    pub source: E,
}

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// `op` receives the 1-based attempt number. Every failed attempt is logged
/// with that number; the error of the last attempt is returned.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation: &'static str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    error = %err,
                    "Attempt failed"
                );
                if attempt >= max_attempts {
                    return Err(RetryError {
                        operation,
                        attempts: attempt,
                        source: err,
                    });
                }
                sleeper.sleep(policy.delay_for_retry(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct RecordingSleeper {
        waits: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("transient failure {0}")]
    struct Transient(u32);

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_retry(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for_retry(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_retry(40), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_succeeds_after_two_failures() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result = with_retry(&RetryPolicy::default(), &sleeper, "upload", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt <= 2 {
                    Err(Transient(attempt))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeper.waits.lock().unwrap(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let err = with_retry(&RetryPolicy::default(), &sleeper, "upload", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(Transient(attempt)) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.attempts, 4);
        assert_eq!(err.source.0, 4);
        assert_eq!(
            *sleeper.waits.lock().unwrap(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
        assert!(err.to_string().contains("upload failed after 4 attempts"));
    }

    #[tokio::test]
    async fn test_no_retry_policy_runs_once() {
        let sleeper = RecordingSleeper::default();
        let err = with_retry(&RetryPolicy::no_retry(), &sleeper, "op", |attempt| async move {
            Err::<(), _>(Transient(attempt))
        })
        .await
        .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(sleeper.waits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let result = with_retry(&policy, &TokioSleeper, "op", |_| async {
            Ok::<_, Transient>("done")
        })
        .await
        .unwrap();
        assert_eq!(result, "done");
    }
}
