//! Risk profile reconciliation
//!
//! A wallet's risk profile lives in three independent stores. This module
//! writes updates to all of them with a 2-of-3 quorum, verifies that they
//! agree afterwards, and reconciles divergent stores towards a canonical
//! record.

pub mod reconciliation;
pub mod scheduler;
pub mod service;
pub mod stores;

pub use reconciliation::select_canonical;
pub use scheduler::{sweep, AutoReconciler, ReconcilerHandle, SweepReport};
pub use service::RiskProfileSyncService;
pub use stores::{MemoryProfileStore, PostgresProfileStore, ProfileStore};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::config::models::SyncConfig;
use crate::core::domain;
use crate::core::types::{ProfileSource, RiskProfile, RiskProfileRecord, Timestamp};

/// Tunables of the reconciliation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// A frontend record younger than this wins reconciliation
    pub frontend_freshness: Duration,
    /// Retries of the write sequence while sources disagree
    pub verification_retries: u32,
    /// Retry `n` waits `retry_step * n`
    pub retry_step: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            frontend_freshness: domain::sync::FRONTEND_FRESHNESS,
            verification_retries: domain::sync::VERIFICATION_RETRIES,
            retry_step: domain::sync::VERIFICATION_BACKOFF_STEP,
        }
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            frontend_freshness: config.frontend_freshness(),
            verification_retries: config.verification_retries,
            retry_step: Duration::from_millis(config.retry_step_ms),
        }
    }
}

/// Snapshot of what every source holds for one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Wallet the snapshot belongs to
    pub wallet: String,
    /// Frontend settings record
    pub frontend: Option<RiskProfileRecord>,
    /// Bot service record
    pub bot_service: Option<RiskProfileRecord>,
    /// Database proxy record
    pub database: Option<RiskProfileRecord>,
    /// At most one distinct profile among the sources that answered
    pub is_in_sync: bool,
    /// Read failures as `"<source>: <message>"`
    pub errors: Vec<String>,
    /// When the snapshot was taken
    pub checked_at: Timestamp,
}

impl SyncStatus {
    /// Build a snapshot and derive `is_in_sync`
    pub fn new(
        wallet: impl Into<String>,
        frontend: Option<RiskProfileRecord>,
        bot_service: Option<RiskProfileRecord>,
        database: Option<RiskProfileRecord>,
        errors: Vec<String>,
        checked_at: Timestamp,
    ) -> Self {
        let mut status = Self {
            wallet: wallet.into(),
            frontend,
            bot_service,
            database,
            is_in_sync: true,
            errors,
            checked_at,
        };
        let distinct: HashSet<RiskProfile> = status.records().map(|(_, r)| r.risk_profile).collect();
        status.is_in_sync = distinct.len() <= 1;
        status
    }

    /// Record held by `source`
    pub fn get(&self, source: ProfileSource) -> Option<&RiskProfileRecord> {
        match source {
            ProfileSource::Frontend => self.frontend.as_ref(),
            ProfileSource::BotService => self.bot_service.as_ref(),
            ProfileSource::Database => self.database.as_ref(),
        }
    }

    /// Present records, in tie-break priority order
    pub fn records(&self) -> impl Iterator<Item = (ProfileSource, &RiskProfileRecord)> + '_ {
        ProfileSource::PRIORITY
            .into_iter()
            .filter_map(move |source| self.get(source).map(|record| (source, record)))
    }

    /// Sources whose value differs from `target`, formatted for reporting
    pub fn conflicts_with(&self, target: RiskProfile) -> Vec<String> {
        self.records()
            .filter(|(_, record)| record.risk_profile != target)
            .map(|(source, record)| format!("{}: {} (expected {})", source, record.risk_profile, target))
            .collect()
    }
}

/// How the verification loop of an update ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Convergence {
    /// Nothing was written; the sources already agreed
    AlreadyInSync,
    /// Sources agreed after the first write sequence
    InSync,
    /// Sources agreed after retrying the write sequence
    Converged {
        /// Write sequences performed
        attempts: u32,
    },
    /// Sources still disagreed when the retry budget ran out
    Exhausted {
        /// Write sequences performed
        attempts: u32,
        /// Summary of the last disagreement
        last_error: String,
    },
}

impl Convergence {
    /// Whether the sources ended up agreeing
    pub fn is_converged(&self) -> bool {
        !matches!(self, Self::Exhausted { .. })
    }
}

/// Outcome of an update or reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    /// At least two of three writes succeeded
    pub success: bool,
    /// Sources still holding a different value
    pub conflicts: Vec<String>,
    /// Failures as `"<source>: <message>"`
    pub errors: Vec<String>,
    /// When the operation finished
    pub timestamp: Timestamp,
    /// Verification outcome
    pub convergence: Convergence,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn record(profile: RiskProfile, source: ProfileSource) -> RiskProfileRecord {
        RiskProfileRecord::new(profile, None, Utc::now(), source)
    }

    #[test]
    fn test_all_agree_is_in_sync() {
        let status = SyncStatus::new(
            "w",
            Some(record(RiskProfile::Balanced, ProfileSource::Frontend)),
            Some(record(RiskProfile::Balanced, ProfileSource::BotService)),
            Some(record(RiskProfile::Balanced, ProfileSource::Database)),
            vec![],
            Utc::now(),
        );
        assert!(status.is_in_sync);
        assert!(status.conflicts_with(RiskProfile::Balanced).is_empty());
    }

    #[test]
    fn test_one_differing_source_breaks_sync() {
        let status = SyncStatus::new(
            "w",
            Some(record(RiskProfile::Balanced, ProfileSource::Frontend)),
            Some(record(RiskProfile::Aggressive, ProfileSource::BotService)),
            Some(record(RiskProfile::Balanced, ProfileSource::Database)),
            vec![],
            Utc::now(),
        );
        assert!(!status.is_in_sync);
        assert_eq!(
            status.conflicts_with(RiskProfile::Balanced),
            vec!["bot_service: Aggressive (expected Balanced)".to_string()]
        );
    }

    #[test]
    fn test_missing_sources_are_ignored() {
        let status = SyncStatus::new(
            "w",
            None,
            Some(record(RiskProfile::Conservative, ProfileSource::BotService)),
            None,
            vec!["frontend: unavailable".to_string()],
            Utc::now(),
        );
        assert!(status.is_in_sync);

        let empty = SyncStatus::new("w", None, None, None, vec![], Utc::now());
        assert!(empty.is_in_sync);
        assert_eq!(empty.records().count(), 0);
    }

    #[test]
    fn test_settings_from_config() {
        let config = SyncConfig {
            retry_step_ms: 250,
            ..SyncConfig::default()
        };
        let settings = SyncSettings::from(&config);
        assert_eq!(settings.retry_step, Duration::from_millis(250));
        assert_eq!(settings.verification_retries, 3);
        assert_eq!(SyncSettings::default().frontend_freshness, Duration::from_secs(3600));
    }

    #[test]
    fn test_convergence_serializes_with_state_tag() {
        let value = serde_json::to_value(Convergence::Converged { attempts: 2 }).unwrap();
        assert_eq!(value, serde_json::json!({ "state": "converged", "attempts": 2 }));
        assert!(!Convergence::Exhausted { attempts: 4, last_error: "x".into() }.is_converged());
    }
}
