//! Configuration data structures and models
//!
//! This module defines the complete configuration structure of the service,
//! including defaults for every optional field so that a partial TOML file
//! is always enough to start.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Environment configuration
    pub environment: EnvironmentConfig,

    /// Settings database configuration
    pub database: DatabaseConfig,

    /// Bot microservice configuration
    pub bot_service: BotServiceConfig,

    /// Reconciliation configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Database recovery configuration
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Price validation configuration
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Monitoring configuration
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Environment name (development, staging, production)
    pub name: String,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log format (json, pretty, compact)
    pub log_format: String,

    /// Directory for rotated log files; stdout only when unset
    #[serde(default)]
    pub log_directory: Option<String>,
}

/// Settings database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,

    /// Table holding per-wallet user settings
    #[serde(default = "default_settings_table")]
    pub settings_table: String,

    /// Maximum pool connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum pool connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Pool acquire timeout in milliseconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_ms: u64,

    /// Idle connection timeout in milliseconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,

    /// Statements slower than this are logged at warn level
    #[serde(default = "default_slow_query_threshold")]
    pub slow_query_threshold_ms: u64,
}

/// Bot microservice configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotServiceConfig {
    /// Base URL of the bot service
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Connect timeout in milliseconds
    #[serde(default = "default_connection_timeout")]
    pub connect_timeout_ms: u64,
}

/// Reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// A frontend record younger than this wins reconciliation
    #[serde(default = "default_frontend_freshness")]
    pub frontend_freshness_secs: u64,

    /// Retries of the write sequence while sources disagree
    #[serde(default = "default_verification_retries")]
    pub verification_retries: u32,

    /// Linear backoff step between verification retries
    #[serde(default = "default_retry_step")]
    pub retry_step_ms: u64,

    /// Run the periodic reconciliation sweep
    #[serde(default)]
    pub auto_reconcile: bool,

    /// Sweep period in seconds
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    /// Wallets covered by the sweep
    #[serde(default)]
    pub wallets: Vec<String>,
}

/// Database recovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Retries for transient database failures
    #[serde(default = "default_recovery_retries")]
    pub max_retries: u32,

    /// First backoff interval in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff cap in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Exponential growth factor
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Randomization factor applied to every interval (0.0 - 1.0)
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Consecutive failures after which the database is reported degraded
    #[serde(default = "default_degraded_threshold")]
    pub degraded_after_failures: u32,
}

/// Price validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Oldest acceptable quote, in seconds
    #[serde(default = "default_max_staleness")]
    pub max_staleness_secs: u64,

    /// Allowed deviation from the rolling average, in percent
    #[serde(default = "default_max_deviation")]
    pub max_deviation_pct: f64,

    /// Allowed coefficient of variation of the window, in percent
    #[serde(default = "default_max_volatility")]
    pub max_volatility_pct: f64,

    /// Minimum 24h volume in USD
    #[serde(default = "default_min_volume")]
    pub min_volume_usd: f64,

    /// Minimum confidence for a quote to be accepted
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Accepted prices kept per token
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Consecutive rejections that open a token's breaker
    #[serde(default = "default_breaker_threshold")]
    pub breaker_failure_threshold: u32,

    /// Seconds a breaker stays open
    #[serde(default = "default_breaker_cooldown")]
    pub breaker_cooldown_secs: u64,
}

/// Monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Expose Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Metrics listener port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Health check interval in seconds
    #[serde(default = "default_health_interval")]
    pub health_check_interval_seconds: u64,
}

fn default_settings_table() -> String { "user_settings".to_string() }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connection_timeout() -> u64 { 5000 }
fn default_idle_timeout() -> u64 { 300000 }
fn default_slow_query_threshold() -> u64 { 1000 }
fn default_request_timeout() -> u64 { 10000 }
fn default_frontend_freshness() -> u64 { 3600 }
fn default_verification_retries() -> u32 { 3 }
fn default_retry_step() -> u64 { 1000 }
fn default_reconcile_interval() -> u64 { 60 }
fn default_recovery_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 100 }
fn default_max_backoff() -> u64 { 5000 }
fn default_multiplier() -> f64 { 2.0 }
fn default_jitter() -> f64 { 0.1 }
fn default_degraded_threshold() -> u32 { 5 }
fn default_max_staleness() -> u64 { 60 }
fn default_max_deviation() -> f64 { 10.0 }
fn default_max_volatility() -> f64 { 15.0 }
fn default_min_volume() -> f64 { 10_000.0 }
fn default_min_confidence() -> f64 { 0.5 }
fn default_history_window() -> usize { 20 }
fn default_breaker_threshold() -> u32 { 3 }
fn default_breaker_cooldown() -> u64 { 300 }
fn default_metrics_port() -> u16 { 9090 }
fn default_health_interval() -> u64 { 30 }
fn default_true() -> bool { true }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            frontend_freshness_secs: default_frontend_freshness(),
            verification_retries: default_verification_retries(),
            retry_step_ms: default_retry_step(),
            auto_reconcile: false,
            reconcile_interval_secs: default_reconcile_interval(),
            wallets: Vec::new(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_recovery_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
            degraded_after_failures: default_degraded_threshold(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            max_staleness_secs: default_max_staleness(),
            max_deviation_pct: default_max_deviation(),
            max_volatility_pct: default_max_volatility(),
            min_volume_usd: default_min_volume(),
            min_confidence: default_min_confidence(),
            history_window: default_history_window(),
            breaker_failure_threshold: default_breaker_threshold(),
            breaker_cooldown_secs: default_breaker_cooldown(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            metrics_port: default_metrics_port(),
            health_check_interval_seconds: default_health_interval(),
        }
    }
}

impl SyncConfig {
    /// Frontend freshness window as a duration
    pub fn frontend_freshness(&self) -> Duration {
        Duration::from_secs(self.frontend_freshness_secs)
    }

    /// Sweep period as a duration
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
}

impl AppConfig {
    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.name == "development"
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment.name == "production"
    }

    /// Validate the configuration, returning the full validation report
    pub fn validate(&self) -> crate::core::result::AppResult<super::ValidationResult> {
        super::ConfigValidator::new().validate(self)
    }

    /// Shorthand for a validation pass without warnings promoted to errors
    pub fn is_valid(&self) -> bool {
        self.validate().map(|r| r.is_valid).unwrap_or(false)
    }
}

impl std::fmt::Display for EnvironmentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (log: {}/{})", self.name, self.log_level, self.log_format)
    }
}
