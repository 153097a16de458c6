//! Canonical record selection

use std::time::Duration;

use super::SyncStatus;
use crate::core::types::{ProfileSource, RiskProfileRecord, Timestamp};

/// Pick the record the other sources should converge to.
///
/// A frontend record updated within `freshness` of `now` wins outright.
/// Otherwise the most recently updated record wins, ties going to the
/// earlier source in [`ProfileSource::PRIORITY`].
pub fn select_canonical(status: &SyncStatus, now: Timestamp, freshness: Duration) -> Option<&RiskProfileRecord> {
    if let Some(frontend) = status.get(ProfileSource::Frontend) {
        let age = now.signed_duration_since(frontend.last_updated);
        let fresh = chrono::Duration::from_std(freshness)
            .map(|window| age <= window)
            .unwrap_or(true);
        if fresh {
            return Some(frontend);
        }
    }

    status
        .records()
        .map(|(_, record)| record)
        .fold(None, |best: Option<&RiskProfileRecord>, candidate| match best {
            Some(current) if candidate.last_updated <= current.last_updated => Some(current),
            _ => Some(candidate),
        })
}
