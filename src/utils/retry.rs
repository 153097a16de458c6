//! Bounded retry with a typed outcome
//!
//! A [`RetryPolicy`] runs an operation up to `max_attempts` times and reports
//! either the value with the number of attempts it took, or the last error
//! once the budget is spent. Callers decide what counts as retryable.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::models::RecoveryConfig;

/// Delay schedule between attempts
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Retry `n` waits `step * n`
    Linear {
        /// Base delay
        step: Duration,
    },
    /// Exponential growth with randomization, driven by the `backoff` crate
    Exponential {
        /// First delay
        initial: Duration,
        /// Growth factor per retry
        multiplier: f64,
        /// Upper bound of a single delay
        max_interval: Duration,
        /// Randomization factor (0.0 - 1.0)
        jitter: f64,
    },
}

/// Result of a bounded retry loop
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T, E> {
    /// The operation succeeded
    Succeeded {
        /// Returned value
        value: T,
        /// Attempts used, including the successful one
        attempts: u32,
    },
    /// Every allowed attempt failed, or a failure was not retryable
    Exhausted {
        /// Attempts used
        attempts: u32,
        /// Error of the final attempt
        last_error: E,
    },
}

impl<T, E> RetryOutcome<T, E> {
    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Whether the budget ran out
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Drop the attempt count
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Succeeded { value, .. } => Ok(value),
            Self::Exhausted { last_error, .. } => Err(last_error),
        }
    }
}

/// Bounded retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay schedule
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    /// Linear policy
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: BackoffStrategy::Linear { step },
        }
    }

    /// Exponential policy
    pub fn exponential(
        max_attempts: u32,
        initial: Duration,
        multiplier: f64,
        max_interval: Duration,
        jitter: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: BackoffStrategy::Exponential {
                initial,
                multiplier,
                max_interval,
                jitter,
            },
        }
    }

    /// Exponential policy for database recovery; `max_retries` excludes the first attempt
    pub fn from_recovery(config: &RecoveryConfig) -> Self {
        Self::exponential(
            config.max_retries.saturating_add(1),
            Duration::from_millis(config.initial_backoff_ms),
            config.multiplier,
            Duration::from_millis(config.max_backoff_ms),
            config.jitter,
        )
    }

    /// Run `operation` until it succeeds or the budget is spent.
    ///
    /// The closure receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_if(operation, |_| true).await
    }

    /// Like [`RetryPolicy::run`], but stops at the first error `should_retry` rejects
    pub async fn run_if<T, E, F, Fut, P>(&self, mut operation: F, should_retry: P) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut schedule = Schedule::new(&self.backoff);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    }
                }
                Err(error) => {
                    if attempt >= self.max_attempts || !should_retry(&error) {
                        return RetryOutcome::Exhausted {
                            attempts: attempt,
                            last_error: error,
                        };
                    }

                    let delay = schedule.next_delay(attempt);
                    debug!("🔄 Attempt {} failed, retrying in {:?}", attempt, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

enum Schedule {
    Linear(Duration),
    Exponential(ExponentialBackoff),
}

impl Schedule {
    fn new(strategy: &BackoffStrategy) -> Self {
        match strategy {
            BackoffStrategy::Linear { step } => Self::Linear(*step),
            BackoffStrategy::Exponential {
                initial,
                multiplier,
                max_interval,
                jitter,
            } => Self::Exponential(
                ExponentialBackoffBuilder::new()
                    .with_initial_interval(*initial)
                    .with_multiplier(*multiplier)
                    .with_max_interval(*max_interval)
                    .with_randomization_factor(*jitter)
                    .with_max_elapsed_time(None)
                    .build(),
            ),
        }
    }

    /// Delay after failed attempt `attempt`
    fn next_delay(&mut self, attempt: u32) -> Duration {
        match self {
            Self::Linear(step) => step.saturating_mul(attempt),
            Self::Exponential(backoff) => backoff.next_backoff().unwrap_or(backoff.max_interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Instant;

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let policy = RetryPolicy::linear(4, Duration::from_millis(1));

        let outcome = policy
            .run(|attempt| async move {
                if attempt < 3 {
                    Err(format!("attempt {} failed", attempt))
                } else {
                    Ok(attempt * 10)
                }
            })
            .await;

        assert_matches!(outcome, RetryOutcome::Succeeded { value: 30, attempts: 3 });
    }

    #[tokio::test]
    async fn test_exhausts_budget() {
        let policy = RetryPolicy::linear(3, Duration::from_millis(1));

        let outcome: RetryOutcome<(), String> = policy
            .run(|attempt| async move { Err(format!("failure {}", attempt)) })
            .await;

        assert!(outcome.is_exhausted());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(outcome.into_result(), Err("failure 3".to_string()));
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_early() {
        let policy = RetryPolicy::linear(5, Duration::from_millis(1));

        let outcome: RetryOutcome<(), &str> = policy
            .run_if(|_| async { Err("permanent") }, |e| *e != "permanent")
            .await;

        assert_matches!(outcome, RetryOutcome::Exhausted { attempts: 1, last_error: "permanent" });
    }

    #[tokio::test]
    async fn test_linear_delays_grow_with_attempts() {
        let policy = RetryPolicy::linear(3, Duration::from_millis(20));
        let started = Instant::now();

        let outcome: RetryOutcome<(), ()> = policy.run(|_| async { Err(()) }).await;

        assert_eq!(outcome.attempts(), 3);
        // 20ms after the first failure, 40ms after the second
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_exponential_policy_from_recovery_config() {
        let config = RecoveryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
            multiplier: 2.0,
            jitter: 0.1,
            degraded_after_failures: 5,
        };
        let policy = RetryPolicy::from_recovery(&config);
        assert_eq!(policy.max_attempts, 3);

        let outcome: RetryOutcome<(), ()> = policy.run(|_| async { Err(()) }).await;
        assert_eq!(outcome.attempts(), 3);
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::linear(0, Duration::from_millis(1)).max_attempts, 1);
    }
}
