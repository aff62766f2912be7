use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::RetryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Sleep `base_delay` between every pair of attempts
    Fixed,
    /// Double the delay after each failed attempt
    Exponential,
}

/// How often and how patiently an operation is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(5),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            backoff: Backoff::Fixed,
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Exponential,
        }
    }

    /// Attempts actually made; a policy always makes at least one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.base_delay.saturating_mul(factor)
            }
        }
    }

    /// Run `op` until it succeeds, the attempts are used up, or `cancel` fires.
    ///
    /// `op` receives the 1-based attempt number. Cancellation is observed
    /// while an attempt is in flight and while waiting between attempts.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt - 1 });
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("{} cancelled during attempt {}", label, attempt);
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
                result = op(attempt) => result,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:.1}s",
                        label,
                        attempt,
                        attempts,
                        e,
                        delay.as_secs_f64()
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            warn!("{} cancelled while waiting to retry", label);
                            return Err(RetryError::Cancelled { attempts: attempt });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!("{} failed after {} attempt(s): {}", label, attempt, e);
                    return Err(RetryError::Exhausted { attempts: attempt, last: e });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_fixed_delay_is_constant() {
        let policy = RetryPolicy::fixed(10, Duration::from_secs(5));
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(9), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_delay_doubles() {
        let policy = RetryPolicy::exponential(5, Duration::from_secs(5));
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for(4), Duration::from_secs(40));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(5, Duration::ZERO);

        let result = policy
            .run("op", &CancellationToken::new(), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(ProviderError::RateLimited("busy".into()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts_and_last_error() {
        let policy = RetryPolicy::fixed(4, Duration::ZERO);
        let err = policy
            .run("op", &CancellationToken::new(), |attempt| async move {
                Err::<(), _>(ProviderError::Request(format!("failure {attempt}")))
            })
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), 4);
        assert!(matches!(
            err,
            RetryError::Exhausted { last: ProviderError::Request(ref m), .. } if m == "failure 4"
        ));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(0, Duration::ZERO);
        let err = policy
            .run("op", &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ProviderError::EmptyResponse) }
            })
            .await
            .unwrap_err();
        assert_eq!(err.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_attempts_only() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(5));
        let start = Instant::now();
        let _ = policy
            .run("op", &CancellationToken::new(), |_| async { Err::<(), _>(ProviderError::EmptyResponse) })
            .await;
        // two gaps between three attempts
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_retrying() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let policy = RetryPolicy::default();
        let start = Instant::now();

        let err = policy
            .run("op", &cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                cancel.cancel();
                async { Err::<(), _>(ProviderError::RateLimited("429".into())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Cancelled { attempts: 1 }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_attempt_in_flight() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = RetryPolicy::default()
            .run("op", &cancel, |_| async {
                std::future::pending::<Result<(), ProviderError>>().await
            })
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.attempts(), 1);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = RetryPolicy::fixed(3, Duration::ZERO)
            .run("op", &cancel, |_| async { Ok::<_, ProviderError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::Cancelled { attempts: 0 }));
    }
}
