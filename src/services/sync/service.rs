//! Reconciliation service

use chrono::Utc;
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::reconciliation::select_canonical;
use super::stores::ProfileStore;
use super::{Convergence, SyncResult, SyncSettings, SyncStatus};
use crate::core::domain;
use crate::core::result::AppResult;
use crate::core::types::{RiskProfile, RiskProfileRecord, WalletAddress};
use crate::core::validation::validate_investment_amount;
use crate::utils::retry::{RetryOutcome, RetryPolicy};

/// What one write-and-verify sequence observed
#[derive(Debug, Default)]
struct AttemptReport {
    successful_writes: usize,
    errors: Vec<String>,
    conflicts: Vec<String>,
}

/// Keeps a wallet's risk profile consistent across the frontend settings,
/// the bot service and the database proxy.
///
/// Writes are sequential and not atomic. Concurrent updates for the same
/// wallet are not serialized, so the last writer per store wins.
pub struct RiskProfileSyncService {
    frontend: Arc<dyn ProfileStore>,
    bot_service: Arc<dyn ProfileStore>,
    database: Arc<dyn ProfileStore>,
    settings: SyncSettings,
}

impl std::fmt::Debug for RiskProfileSyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskProfileSyncService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl RiskProfileSyncService {
    /// Create a service over the three stores
    pub fn new(
        frontend: Arc<dyn ProfileStore>,
        bot_service: Arc<dyn ProfileStore>,
        database: Arc<dyn ProfileStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            frontend,
            bot_service,
            database,
            settings,
        }
    }

    /// Active settings
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    fn write_order(&self) -> [&Arc<dyn ProfileStore>; 3] {
        [&self.frontend, &self.bot_service, &self.database]
    }

    /// Write a profile to every store and verify that they agree.
    ///
    /// Succeeds when at least two writes land. While sources still disagree
    /// the whole sequence is retried with linear backoff; the outcome is in
    /// [`SyncResult::convergence`]. Never returns an error.
    #[instrument(skip(self, wallet), fields(wallet = %wallet.short()))]
    pub async fn update_risk_profile(
        &self,
        wallet: &WalletAddress,
        risk_profile: RiskProfile,
        investment_amount: Option<Decimal>,
    ) -> SyncResult {
        let started = Instant::now();

        if let Err(e) = validate_investment_amount(investment_amount) {
            warn!("⚠️  Rejected update for {}: {}", wallet.short(), e);
            counter!("risk_sync_updates_total", "outcome" => "rejected").increment(1);
            return SyncResult {
                success: false,
                conflicts: Vec::new(),
                errors: vec![e.to_string()],
                timestamp: Utc::now(),
                convergence: Convergence::Exhausted {
                    attempts: 0,
                    last_error: e.to_string(),
                },
            };
        }

        let policy = RetryPolicy::linear(
            self.settings.verification_retries.saturating_add(1),
            self.settings.retry_step,
        );

        let outcome = policy
            .run(|attempt| self.write_and_verify(wallet, risk_profile, investment_amount, attempt))
            .await;

        let (report, convergence) = match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                let convergence = if attempts == 1 {
                    Convergence::InSync
                } else {
                    Convergence::Converged { attempts }
                };
                (value, convergence)
            }
            RetryOutcome::Exhausted { attempts, last_error } => {
                let summary = format!(
                    "sources still disagree after {} write sequence(s): {}",
                    attempts,
                    last_error.conflicts.join("; ")
                );
                error!("❌ Risk profile for {} did not converge: {}", wallet.short(), summary);
                (
                    last_error,
                    Convergence::Exhausted {
                        attempts,
                        last_error: summary,
                    },
                )
            }
        };

        let success = report.successful_writes >= domain::sync::WRITE_QUORUM;
        let mut errors = report.errors;
        if let Convergence::Exhausted { last_error, .. } = &convergence {
            errors.push(last_error.clone());
        }

        let outcome_label = match (&convergence, success) {
            (_, false) => "failed",
            (Convergence::Exhausted { .. }, true) => "diverged",
            _ => "synced",
        };
        counter!("risk_sync_updates_total", "outcome" => outcome_label).increment(1);
        histogram!("risk_sync_update_duration_seconds").record(started.elapsed().as_secs_f64());

        if success {
            info!(
                "✅ Risk profile {} written for {} ({}/3 stores)",
                risk_profile,
                wallet.short(),
                report.successful_writes
            );
        } else {
            error!(
                "❌ Risk profile update for {} missed quorum ({}/3 stores)",
                wallet.short(),
                report.successful_writes
            );
        }

        SyncResult {
            success,
            conflicts: report.conflicts,
            errors,
            timestamp: Utc::now(),
            convergence,
        }
    }

    async fn write_and_verify(
        &self,
        wallet: &WalletAddress,
        risk_profile: RiskProfile,
        investment_amount: Option<Decimal>,
        attempt: u32,
    ) -> Result<AttemptReport, AttemptReport> {
        let mut report = AttemptReport::default();

        for store in self.write_order() {
            match store.store(wallet, risk_profile, investment_amount).await {
                Ok(()) => report.successful_writes += 1,
                Err(e) => {
                    let source = store.source();
                    warn!("⚠️  Write to {} failed for {}: {}", source, wallet.short(), e);
                    counter!("risk_sync_write_failures_total", "source" => source.as_str()).increment(1);
                    report.errors.push(format!("{}: {}", source, e));
                }
            }
        }

        let status = self.get_sync_status(wallet).await;
        report.errors.extend(status.errors.iter().cloned());
        report.conflicts = status.conflicts_with(risk_profile);

        if report.conflicts.is_empty() {
            Ok(report)
        } else {
            debug!(
                "🔁 Attempt {} left {} conflict(s) for {}",
                attempt,
                report.conflicts.len(),
                wallet.short()
            );
            counter!("risk_sync_conflicts_total").increment(report.conflicts.len() as u64);
            Err(report)
        }
    }

    /// Read every source concurrently.
    ///
    /// A failed read leaves that source empty and is listed in `errors`.
    #[instrument(skip(self, wallet), fields(wallet = %wallet.short()))]
    pub async fn get_sync_status(&self, wallet: &WalletAddress) -> SyncStatus {
        let (frontend, bot_service, database) = futures::join!(
            self.frontend.fetch(wallet),
            self.bot_service.fetch(wallet),
            self.database.fetch(wallet),
        );

        let mut errors = Vec::new();
        let frontend = Self::keep_record(self.frontend.as_ref(), frontend, &mut errors);
        let bot_service = Self::keep_record(self.bot_service.as_ref(), bot_service, &mut errors);
        let database = Self::keep_record(self.database.as_ref(), database, &mut errors);

        SyncStatus::new(wallet.as_str(), frontend, bot_service, database, errors, Utc::now())
    }

    fn keep_record(
        store: &dyn ProfileStore,
        result: AppResult<Option<RiskProfileRecord>>,
        errors: &mut Vec<String>,
    ) -> Option<RiskProfileRecord> {
        match result {
            Ok(record) => record,
            Err(e) => {
                warn!("⚠️  Read from {} failed: {}", store.source(), e);
                errors.push(format!("{}: {}", store.source(), e));
                None
            }
        }
    }

    /// Bring divergent sources back in line with the canonical record
    #[instrument(skip(self, wallet), fields(wallet = %wallet.short()))]
    pub async fn perform_reconciliation(&self, wallet: &WalletAddress) -> SyncResult {
        let status = self.get_sync_status(wallet).await;

        if status.is_in_sync {
            debug!("✅ {} already in sync", wallet.short());
            counter!("risk_sync_reconciliations_total", "result" => "in_sync").increment(1);
            return SyncResult {
                success: true,
                conflicts: Vec::new(),
                errors: status.errors,
                timestamp: Utc::now(),
                convergence: Convergence::AlreadyInSync,
            };
        }

        let Some(canonical) = select_canonical(&status, Utc::now(), self.settings.frontend_freshness).cloned() else {
            // out of sync implies at least two records
            counter!("risk_sync_reconciliations_total", "result" => "failed").increment(1);
            return SyncResult {
                success: false,
                conflicts: Vec::new(),
                errors: status.errors,
                timestamp: Utc::now(),
                convergence: Convergence::Exhausted {
                    attempts: 0,
                    last_error: "no canonical record".to_string(),
                },
            };
        };

        info!(
            "🔄 Reconciling {} towards {} from {}",
            wallet.short(),
            canonical.risk_profile,
            canonical.source
        );

        let result = self
            .update_risk_profile(wallet, canonical.risk_profile, canonical.investment_amount)
            .await;

        let label = if result.success { "reconciled" } else { "failed" };
        counter!("risk_sync_reconciliations_total", "result" => label).increment(1);
        result
    }
}
