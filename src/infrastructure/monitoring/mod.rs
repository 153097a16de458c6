//! Monitoring infrastructure module
//!
//! Registers metric descriptions with the `metrics` facade and, when the
//! `prometheus` feature is enabled, installs the Prometheus exporter.

use metrics::{describe_counter, describe_histogram, Unit};
use tracing::info;

use crate::core::result::AppResult;

/// Describe every metric the crate records
pub fn describe_metrics() {
    describe_counter!("risk_sync_updates_total", "Risk profile updates by outcome");
    describe_counter!("risk_sync_write_failures_total", "Failed store writes by source");
    describe_counter!("risk_sync_conflicts_total", "Sources still disagreeing after a write sequence");
    describe_counter!("risk_sync_reconciliations_total", "Reconciliation runs by result");
    describe_histogram!(
        "risk_sync_update_duration_seconds",
        Unit::Seconds,
        "Duration of a full update including verification retries"
    );

    describe_counter!("price_validation_total", "Validated price quotes by result");
    describe_counter!("price_validation_breaker_open_total", "Token circuit breakers opened");
    describe_histogram!("price_validation_confidence", "Confidence assigned to validated quotes");

    describe_counter!("db_recovery_retries_total", "Database retries by operation");
    describe_counter!("db_recovery_failures_total", "Database operations that failed for good");
    describe_counter!("db_recovery_critical_total", "Critical database errors by category");
}

/// Install the Prometheus exporter on `0.0.0.0:port`
#[cfg(feature = "prometheus")]
pub fn install_prometheus(port: u16) -> AppResult<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .map_err(|e| crate::core::error::AppError::internal(format!("Failed to install Prometheus exporter: {}", e)))?;

    describe_metrics();
    info!("📊 Prometheus metrics exposed on port {}", port);
    Ok(())
}

/// Without the exporter only the descriptions are registered
#[cfg(not(feature = "prometheus"))]
pub fn install_prometheus(port: u16) -> AppResult<()> {
    describe_metrics();
    info!("📊 Prometheus exporter not compiled in; metrics on port {} disabled", port);
    Ok(())
}
