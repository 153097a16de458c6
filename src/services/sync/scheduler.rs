//! Periodic reconciliation
//!
//! [`AutoReconciler::start`] spawns a sweep loop and hands back an owned
//! [`ReconcilerHandle`]; dropping or stopping the handle ends the loop.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::service::RiskProfileSyncService;
use crate::core::types::{Timestamp, WalletAddress};

/// Counters of one sweep over the configured wallets
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    /// Sweep identifier for log correlation
    pub sweep_id: Uuid,
    /// Wallets whose status was read
    pub checked: usize,
    /// Wallets that were already in sync
    pub in_sync: usize,
    /// Out-of-sync wallets reconciled successfully
    pub reconciled: usize,
    /// Out-of-sync wallets whose reconciliation failed
    pub failed: usize,
    /// When the sweep started
    pub started_at: Timestamp,
    /// Wall time of the sweep
    pub duration: Duration,
}

/// Check every wallet and reconcile the ones that disagree
pub async fn sweep(service: &RiskProfileSyncService, wallets: &[WalletAddress]) -> SweepReport {
    sweep_until(service, wallets, None).await
}

async fn sweep_until(
    service: &RiskProfileSyncService,
    wallets: &[WalletAddress],
    cancel: Option<&CancellationToken>,
) -> SweepReport {
    let started = Instant::now();
    let mut report = SweepReport {
        sweep_id: Uuid::new_v4(),
        checked: 0,
        in_sync: 0,
        reconciled: 0,
        failed: 0,
        started_at: Utc::now(),
        duration: Duration::ZERO,
    };

    debug!("🧹 Sweep {} over {} wallet(s)", report.sweep_id, wallets.len());

    for wallet in wallets {
        // the wallet in progress always finishes
        if cancel.is_some_and(|token| token.is_cancelled()) {
            debug!("🛑 Sweep {} interrupted by shutdown", report.sweep_id);
            break;
        }

        let status = service.get_sync_status(wallet).await;
        report.checked += 1;

        if status.is_in_sync {
            report.in_sync += 1;
            continue;
        }

        let result = service.perform_reconciliation(wallet).await;
        if result.success && result.convergence.is_converged() {
            report.reconciled += 1;
        } else {
            report.failed += 1;
            warn!(
                "⚠️  Reconciliation of {} incomplete: {}",
                wallet.short(),
                result.errors.join("; ")
            );
        }
    }

    report.duration = started.elapsed();
    info!(
        "🧹 Sweep {} done: checked={}, in_sync={}, reconciled={}, failed={} ({}ms)",
        report.sweep_id,
        report.checked,
        report.in_sync,
        report.reconciled,
        report.failed,
        report.duration.as_millis()
    );
    report
}

/// Starts the periodic sweep
#[derive(Debug)]
pub struct AutoReconciler;

impl AutoReconciler {
    /// Spawn the sweep loop. The first sweep runs one `interval` after start.
    pub fn start(
        service: Arc<RiskProfileSyncService>,
        wallets: Vec<WalletAddress>,
        interval: Duration,
    ) -> ReconcilerHandle {
        let interval = interval.max(Duration::from_millis(1));
        let token = CancellationToken::new();
        let child = token.clone();

        info!(
            "⏱️  Auto reconciliation every {:?} for {} wallet(s)",
            interval,
            wallets.len()
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        sweep_until(&service, &wallets, Some(&child)).await;
                    }
                }
            }

            debug!("⏱️  Auto reconciliation loop exited");
        });

        ReconcilerHandle {
            token,
            task: Some(task),
        }
    }
}

/// Owned handle to a running sweep loop
#[derive(Debug)]
pub struct ReconcilerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ReconcilerHandle {
    /// Loop is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the loop and wait for the current wallet to finish
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("⚠️  Auto reconciliation task ended abnormally: {}", e);
            }
        }
        info!("🛑 Auto reconciliation stopped");
    }
}

impl Drop for ReconcilerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
