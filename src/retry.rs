//! Retry envelope — bounded exponential backoff around external calls.
//!
//! Every outbound call in the pipeline (feed request, document fetch,
//! analysis call, notification send) goes through exactly one
//! [`with_retry`] — callers never nest envelopes.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Classifies an error as retryable or not.
///
/// Transient: network timeouts, 5xx, rate limits. Permanent: 4xx, auth
/// failures, malformed input. Permanent errors surface after one attempt.
pub trait Transience {
    fn is_transient(&self) -> bool;
}

/// Retry policy: attempt bound plus the starting backoff delay.
///
/// The delay doubles after every failed attempt, with up to 250ms of jitter
/// added so concurrent pipeline instances don't retry in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Run `op` under `policy`, retrying transient failures with exponential
/// backoff. Returns the first success, the first permanent failure, or the
/// last transient failure once attempts are exhausted.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, desc: &str, mut op: F) -> Result<T, E>
where
    E: Transience + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.base_delay;

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => {
                warn!(attempt, error = %e, "{desc} failed permanently; not retrying");
                return Err(e);
            }
            Err(e) if attempt == max_attempts => {
                warn!(
                    attempts = max_attempts,
                    error = %e,
                    "{desc} exhausted all retries"
                );
                return Err(e);
            }
            Err(e) => {
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
                warn!(
                    attempt,
                    max = max_attempts,
                    error = %e,
                    "{desc} failed; retrying in {:?}",
                    delay + jitter
                );
                tokio::time::sleep(delay + jitter).await;
                delay *= 2;
            }
        }
    }

    unreachable!("retry loop returns on every branch of the final attempt")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("flaky")]
        Flaky,
        #[error("fatal")]
        Fatal,
    }

    impl Transience for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Flaky)
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_attempted_exactly_max_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let result: Result<(), TestError> = with_retry(fast_policy(3), "always-flaky", || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Flaky)
            }
        })
        .await;

        assert!(matches!(result, Err(TestError::Flaky)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_attempted_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let result: Result<(), TestError> = with_retry(fast_policy(5), "always-fatal", || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Fatal)
            }
        })
        .await;

        assert!(matches!(result, Err(TestError::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let result: Result<u32, TestError> = with_retry(fast_policy(3), "flaky-then-ok", || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Err(TestError::Flaky) } else { Ok(n) }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_is_clamped_to_one() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let result: Result<(), TestError> = with_retry(fast_policy(0), "clamped", || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Flaky)
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
