//! Timeout and bounded retry around outbound calls.
//!
//! Every venue call in the engine is wrapped as
//! `with_retry(policy, || with_timeout(call, deadline))`. A late result is
//! dropped together with the abandoned future.

use std::future::Future;
use std::time::Duration;

use eyre::{Report, Result};
use log::{debug, warn};

use super::errors::EngineError;

/// How many times to try and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    /// Backoff slept after failed attempt number `attempt` (1-based):
    /// `initial_delay * 2^(attempt-1)`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay.saturating_mul(1u32 << exponent)
    }
}

/// Races `operation` against `deadline`.
///
/// # Errors
/// * `EngineError::Timeout` if the deadline elapses first
/// * Whatever `operation` fails with
pub async fn with_timeout<T, F>(operation: F, deadline: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => Err(Report::new(EngineError::Timeout {
            millis: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        })),
    }
}

/// Runs `operation` until it succeeds or `policy.max_attempts` is used up.
///
/// # Arguments
/// * `policy` - attempts and backoff
/// * `op_name` - label for logs
/// * `operation` - produces a fresh future per attempt
///
/// # Errors
/// The last attempt's error once all attempts failed
pub async fn with_retry<T, Fut, F>(policy: &RetryPolicy, op_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("retry::{op_name}: succeeded on attempt {attempt}");
                }
                return Ok(value);
            }
            Err(err) if attempt >= max_attempts => {
                warn!("retry::{op_name}: giving up after {attempt} attempts: {err}");
                return Err(err);
            }
            Err(err) => {
                let delay = policy.backoff(attempt);
                debug!(
                    "retry::{op_name}: attempt {attempt} failed ({err}), retrying in {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(max_attempts: u32, initial_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(initial_ms),
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = policy(5, 300);
        assert_eq!(policy.backoff(1), Duration::from_millis(300));
        assert_eq!(policy.backoff(2), Duration::from_millis(600));
        assert_eq!(policy.backoff(3), Duration::from_millis(1200));
        assert_eq!(policy.backoff(4), Duration::from_millis(2400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires() {
        let result: Result<u32> = with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(1)
            },
            Duration::from_millis(50),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(
            err.downcast_ref::<EngineError>(),
            Some(&EngineError::Timeout { millis: 50 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_passes_result_through() {
        let result = with_timeout(async { Ok(7) }, Duration::from_millis(50)).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = with_retry(&policy(3, 100), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    eyre::bail!("attempt {n} failed");
                }
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms after the first failure, 200ms after the second
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_surfaces_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<u32> = with_retry(&policy(3, 10), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { eyre::bail!("failure #{n}") }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err().to_string(), "failure #3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_composes_with_timeout() {
        let calls = AtomicU32::new(0);

        let result = with_retry(&policy(2, 10), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            with_timeout(
                async move {
                    if n == 1 {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    }
                    Ok(n)
                },
                Duration::from_millis(20),
            )
        })
        .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let _ = with_retry(&policy(0, 1), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Report>(()) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
