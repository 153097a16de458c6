//! Configuration validation logic
//!
//! Checks every configuration value against its acceptable range before the
//! service starts. Errors are fatal; warnings are reported and, in strict
//! mode, promoted to errors.

use tracing::{debug, warn};
use url::Url;

use super::models::{
    AppConfig, BotServiceConfig, DatabaseConfig, EnvironmentConfig, PricingConfig, RecoveryConfig,
    SyncConfig,
};
use crate::core::result::AppResult;
use crate::core::validation::validate_solana_address;

/// Configuration validator
pub struct ConfigValidator {
    /// Strict validation mode (fails on warnings)
    strict_mode: bool,
}

/// Validation result with warnings and errors
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Fatal validation errors
    pub errors: Vec<String>,

    /// Non-fatal warnings
    pub warnings: Vec<String>,

    /// Validation passed
    pub is_valid: bool,
}

impl ConfigValidator {
    /// Create a new validator with default settings
    pub fn new() -> Self {
        Self { strict_mode: false }
    }

    /// Enable strict validation mode
    pub fn with_strict_mode(mut self) -> Self {
        self.strict_mode = true;
        self
    }

    /// Validate the complete application configuration
    pub fn validate(&self, config: &AppConfig) -> AppResult<ValidationResult> {
        debug!("🔍 Starting configuration validation");

        let mut result = ValidationResult {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        };

        self.validate_environment(&config.environment, &mut result);
        self.validate_database(&config.database, &mut result);
        self.validate_bot_service(&config.bot_service, &mut result);
        self.validate_sync(&config.sync, &mut result);
        self.validate_recovery(&config.recovery, &mut result);
        self.validate_pricing(&config.pricing, &mut result);

        if config.is_production() && config.bot_service.base_url.starts_with("http://") {
            result
                .warnings
                .push("Bot service is reached over plain HTTP in production".to_string());
        }

        result.is_valid = result.errors.is_empty() && (!self.strict_mode || result.warnings.is_empty());

        if result.is_valid {
            debug!("✅ Configuration validation passed");
        } else {
            warn!("❌ Configuration validation failed");
            for error in &result.errors {
                warn!("   Error: {}", error);
            }
            for warning in &result.warnings {
                warn!("   Warning: {}", warning);
            }
        }

        Ok(result)
    }

    fn validate_environment(&self, config: &EnvironmentConfig, result: &mut ValidationResult) {
        match config.name.as_str() {
            "development" | "staging" | "production" | "test" => {}
            other => result.errors.push(format!("Unknown environment name '{}'", other)),
        }

        match config.log_level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => result.errors.push(format!("Invalid log level '{}'", other)),
        }

        match config.log_format.as_str() {
            "json" | "pretty" | "compact" => {}
            other => result.errors.push(format!(
                "Invalid log format '{}'. Must be 'json', 'pretty', or 'compact'",
                other
            )),
        }
    }

    fn validate_database(&self, config: &DatabaseConfig, result: &mut ValidationResult) {
        if config.url.is_empty() {
            result.errors.push("Database URL is required".to_string());
        } else if !(config.url.starts_with("postgres://") || config.url.starts_with("postgresql://")) {
            result
                .errors
                .push("Database URL must use the postgres:// or postgresql:// scheme".to_string());
        }

        // The table name is interpolated into SQL, so only identifiers are allowed
        let table_ok = !config.settings_table.is_empty()
            && config
                .settings_table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !table_ok {
            result
                .errors
                .push(format!("Invalid settings table name '{}'", config.settings_table));
        }

        if config.min_connections > config.max_connections {
            result.errors.push(format!(
                "Database min_connections ({}) exceeds max_connections ({})",
                config.min_connections, config.max_connections
            ));
        }

        if config.max_connections == 0 {
            result.errors.push("Database max_connections must be positive".to_string());
        }
    }

    fn validate_bot_service(&self, config: &BotServiceConfig, result: &mut ValidationResult) {
        match Url::parse(&config.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => result
                .errors
                .push(format!("Bot service URL has unsupported scheme '{}'", url.scheme())),
            Err(e) => result.errors.push(format!("Bot service URL: {}", e)),
        }

        if config.request_timeout_ms == 0 {
            result.errors.push("Bot service request timeout must be positive".to_string());
        } else if config.request_timeout_ms > 60_000 {
            result
                .warnings
                .push("Bot service request timeout above 60s stalls the sweep".to_string());
        }
    }

    fn validate_sync(&self, config: &SyncConfig, result: &mut ValidationResult) {
        if config.reconcile_interval_secs == 0 {
            result.errors.push("Reconcile interval must be positive".to_string());
        }

        if config.verification_retries > 10 {
            result.warnings.push(format!(
                "{} verification retries with linear backoff can take minutes",
                config.verification_retries
            ));
        }

        for wallet in &config.wallets {
            if let Err(e) = validate_solana_address(wallet) {
                result.errors.push(format!("Sync wallet '{}': {}", wallet, e));
            }
        }

        if config.auto_reconcile && config.wallets.is_empty() {
            result
                .warnings
                .push("Auto reconciliation enabled without any wallets".to_string());
        }
    }

    fn validate_recovery(&self, config: &RecoveryConfig, result: &mut ValidationResult) {
        if !(0.0..=1.0).contains(&config.jitter) {
            result
                .errors
                .push(format!("Recovery jitter must be within 0.0..=1.0, got {}", config.jitter));
        }

        if config.multiplier < 1.0 {
            result
                .errors
                .push(format!("Recovery multiplier must be >= 1.0, got {}", config.multiplier));
        }

        if config.initial_backoff_ms > config.max_backoff_ms {
            result
                .errors
                .push("Recovery initial backoff exceeds the backoff cap".to_string());
        }
    }

    fn validate_pricing(&self, config: &PricingConfig, result: &mut ValidationResult) {
        if !(0.0..=1.0).contains(&config.min_confidence) {
            result.errors.push(format!(
                "Pricing min_confidence must be within 0.0..=1.0, got {}",
                config.min_confidence
            ));
        }

        if config.max_deviation_pct <= 0.0 || config.max_volatility_pct <= 0.0 {
            result
                .errors
                .push("Pricing deviation and volatility limits must be positive".to_string());
        }

        if config.history_window < 2 {
            result
                .warnings
                .push("Pricing history window below 2 disables deviation checks".to_string());
        }

        if config.breaker_failure_threshold == 0 {
            result
                .errors
                .push("Pricing breaker_failure_threshold must be positive".to_string());
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
