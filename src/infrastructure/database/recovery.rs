//! Database recovery manager
//!
//! Runs queries through a bounded exponential retry, retrying only failures
//! the classifier marks as transient, and keeps a consecutive-failure streak
//! so the health service can report the database as degraded.

use metrics::counter;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::{debug, error, warn};

use super::errors::{classify_sqlx_error, DbErrorInfo};
use crate::application::health::ComponentHealth;
use crate::config::models::RecoveryConfig;
use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::utils::retry::{RetryOutcome, RetryPolicy};

/// Snapshot of recovery counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Operations submitted
    pub operations: u64,
    /// Retries performed across all operations
    pub retries: u64,
    /// Operations that failed for good
    pub failures: u64,
    /// Failed attempts since the last success
    pub consecutive_failures: u32,
}

/// Retrying executor for database operations
#[derive(Debug)]
pub struct DatabaseRecovery {
    policy: RetryPolicy,
    degraded_after: u32,
    consecutive_failures: AtomicU32,
    operations: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
}

impl DatabaseRecovery {
    /// Create a recovery manager from configuration
    pub fn new(config: &RecoveryConfig) -> Self {
        Self {
            policy: RetryPolicy::from_recovery(config),
            degraded_after: config.degraded_after_failures.max(1),
            consecutive_failures: AtomicU32::new(0),
            operations: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Execute `query`, retrying transient failures.
    ///
    /// The final failure is returned as `AppError::Database` with the
    /// SQLSTATE and retryability of the last attempt.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut query: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        self.operations.fetch_add(1, Ordering::Relaxed);

        let outcome = self
            .policy
            .run_if(
                |attempt| {
                    if attempt > 1 {
                        self.retries.fetch_add(1, Ordering::Relaxed);
                        counter!("db_recovery_retries_total", "operation" => operation.to_string()).increment(1);
                    }
                    let fut = query();
                    async move {
                        match fut.await {
                            Ok(value) => {
                                self.consecutive_failures.store(0, Ordering::Relaxed);
                                Ok(value)
                            }
                            Err(e) => {
                                let info = classify_sqlx_error(&e);
                                self.note_failure(operation, attempt, &e, &info);
                                Err((e, info))
                            }
                        }
                    }
                },
                |(_, info)| info.retryable,
            )
            .await;

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                if attempts > 1 {
                    debug!("✅ {} recovered after {} attempts", operation, attempts);
                }
                Ok(value)
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error: (e, info),
            } => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                counter!(
                    "db_recovery_failures_total",
                    "operation" => operation.to_string(),
                    "category" => info.category.as_str()
                )
                .increment(1);

                Err(AppError::Database {
                    message: format!(
                        "{} failed after {} attempt(s) ({}): {}",
                        operation, attempts, info.category, e
                    ),
                    operation: operation.to_string(),
                    sqlstate: info.sqlstate,
                    retryable: info.retryable,
                })
            }
        }
    }

    fn note_failure(&self, operation: &str, attempt: u32, error: &sqlx::Error, info: &DbErrorInfo) {
        let streak = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;

        if info.critical {
            counter!("db_recovery_critical_total", "category" => info.category.as_str()).increment(1);
            error!(
                "🚨 Critical database error in {} (attempt {}, sqlstate {:?}): {}",
                operation, attempt, info.sqlstate, error
            );
        } else {
            warn!(
                "⚠️  Database error in {} (attempt {}, {}, retryable={}): {}",
                operation, attempt, info.category, info.retryable, error
            );
        }

        if streak == self.degraded_after {
            error!("❌ Database degraded after {} consecutive failures", streak);
        }
    }

    /// The failure streak has reached the degradation threshold
    pub fn is_degraded(&self) -> bool {
        self.consecutive_failures.load(Ordering::Relaxed) >= self.degraded_after
    }

    /// Current counters
    pub fn stats(&self) -> RecoveryStats {
        RecoveryStats {
            operations: self.operations.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
        }
    }

    /// Health of the recovery manager, based on the failure streak
    pub fn health_check(&self) -> ComponentHealth {
        let mut component = ComponentHealth::new("db_recovery".to_string(), false);
        let stats = self.stats();

        if self.is_degraded() {
            component.mark_degraded(
                format!("{} consecutive database failures", stats.consecutive_failures),
                None,
            );
        } else {
            component.mark_healthy(
                Some(format!(
                    "{} operations, {} retries, {} failures",
                    stats.operations, stats.retries, stats.failures
                )),
                None,
            );
        }

        component
    }
}
