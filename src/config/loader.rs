//! Configuration loader with multi-source support
//!
//! Loads and merges configuration from a TOML file, environment variables
//! (prefix `RISK_SYNC_`) and command-line arguments, in that order of
//! increasing precedence.

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::de::DeserializeOwned;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::models::{
    AppConfig, BotServiceConfig, DatabaseConfig, EnvironmentConfig, MonitoringConfig, PricingConfig,
    RecoveryConfig, SyncConfig,
};
use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::utils::CliArgs;

/// Configuration loader with support for multiple sources
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base configuration path
    config_path: Option<PathBuf>,

    /// CLI arguments
    cli_args: Option<CliArgs>,

    /// Environment prefix for variables
    env_prefix: String,

    /// Enable environment variable loading
    enable_env: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            config_path: None,
            cli_args: None,
            env_prefix: "RISK_SYNC".to_string(),
            enable_env: true,
        }
    }

    /// Set the base configuration path
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set CLI arguments
    pub fn with_cli_args(mut self, args: CliArgs) -> Self {
        self.cli_args = Some(args);
        self
    }

    /// Set environment variable prefix
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Disable environment variable loading
    pub fn without_env(mut self) -> Self {
        self.enable_env = false;
        self
    }

    /// Load and build the complete application configuration
    pub async fn load(self) -> AppResult<AppConfig> {
        info!("🔧 Starting configuration loading process");

        let mut config = self
            .load_base_config()
            .await
            .map_err(|e| AppError::config(format!("Failed to load base configuration: {:#}", e)))?;

        if self.enable_env {
            self.apply_environment_overrides(&mut config)
                .map_err(|e| AppError::config(format!("Failed to apply environment overrides: {:#}", e)))?;
        }

        if let Some(ref cli_args) = self.cli_args {
            self.apply_cli_overrides(&mut config, cli_args);
        }

        info!("✅ Configuration loading completed successfully");
        debug!(
            "📊 Final configuration: environment={}, wallets={}",
            config.environment.name,
            config.sync.wallets.len()
        );

        Ok(config)
    }

    /// Load base configuration from TOML file
    async fn load_base_config(&self) -> Result<AppConfig> {
        let config_path = self.resolve_config_path();

        info!("📄 Loading base configuration from: {}", config_path.display());

        if !config_path.exists() {
            warn!("⚠️  Configuration file not found: {}", config_path.display());
            warn!("⚠️  Using default configuration values");
            return Ok(self.create_default_config());
        }

        let config_content = tokio::fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: AppConfig = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;

        debug!("✅ Base configuration loaded successfully");
        Ok(config)
    }

    /// Resolve the configuration file path
    fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref path) = self.config_path {
            return path.clone();
        }

        if let Some(ref cli_args) = self.cli_args {
            if let Some(ref path) = cli_args.config_path {
                return PathBuf::from(path);
            }
        }

        if let Ok(path) = env::var("CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let default_paths = [
            "configs/config.toml",
            "config.toml",
            "/etc/risk-sync/config.toml",
        ];

        for path in &default_paths {
            let pb = PathBuf::from(path);
            if pb.exists() {
                debug!("📍 Found config file at: {}", pb.display());
                return pb;
            }
        }

        PathBuf::from("configs/config.toml")
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&self, config: &mut AppConfig) -> Result<()> {
        debug!("🌍 Applying environment variable overrides");

        let env_config = Config::builder()
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .ignore_empty(true),
            )
            .build()
            .context("Failed to build environment configuration")?;

        self.apply_env_var(config, &env_config, "database_url", |cfg, val: String| {
            cfg.database.url = val;
        });

        self.apply_env_var(config, &env_config, "settings_table", |cfg, val: String| {
            cfg.database.settings_table = val;
        });

        self.apply_env_var(config, &env_config, "bot_service_url", |cfg, val: String| {
            cfg.bot_service.base_url = val;
        });

        self.apply_env_var(config, &env_config, "log_level", |cfg, val: String| {
            cfg.environment.log_level = val;
        });

        self.apply_env_var(config, &env_config, "log_format", |cfg, val: String| {
            cfg.environment.log_format = val;
        });

        self.apply_env_var(config, &env_config, "auto_reconcile", |cfg, val: bool| {
            cfg.sync.auto_reconcile = val;
        });

        self.apply_env_var(config, &env_config, "reconcile_interval_secs", |cfg, val: u64| {
            cfg.sync.reconcile_interval_secs = val;
        });

        // Comma separated, parsed by hand so a single wallet is not read as a scalar
        if let Ok(wallets) = env::var(format!("{}_WALLETS", self.env_prefix)) {
            let wallets: Vec<String> = wallets
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !wallets.is_empty() {
                config.sync.wallets = wallets;
            }
        }

        // Conventional fallback used by most Postgres tooling
        if config.database.url.is_empty() {
            if let Ok(url) = env::var("DATABASE_URL") {
                config.database.url = url;
            }
        }

        debug!("✅ Environment variable overrides applied");
        Ok(())
    }

    /// Apply a single environment variable with type conversion
    fn apply_env_var<T, F>(&self, config: &mut AppConfig, env_config: &Config, key: &str, applier: F)
    where
        T: DeserializeOwned,
        F: FnOnce(&mut AppConfig, T),
    {
        if let Ok(value) = env_config.get::<T>(key) {
            applier(config, value);
            debug!("🔄 Applied environment override: {}", key);
        }
    }

    /// Apply CLI argument overrides
    fn apply_cli_overrides(&self, config: &mut AppConfig, cli_args: &CliArgs) {
        debug!("⌨️  Applying CLI argument overrides");

        if let Some(ref env_name) = cli_args.environment {
            config.environment.name = env_name.clone();
        }

        if let Some(ref level) = cli_args.log_level {
            config.environment.log_level = level.clone();
        }

        if let Some(ref format) = cli_args.log_format {
            config.environment.log_format = format.clone();
        }

        if !cli_args.wallets.is_empty() {
            config.sync.wallets = cli_args.wallets.clone();
        }

        if cli_args.auto_reconcile {
            config.sync.auto_reconcile = true;
        }

        if let Some(interval) = cli_args.interval_secs {
            config.sync.reconcile_interval_secs = interval;
        }

        if let Some(port) = cli_args.metrics_port {
            config.monitoring.metrics_port = port;
        }

        debug!("✅ CLI argument overrides applied");
    }

    /// Create default configuration when no config file is found
    pub fn create_default_config(&self) -> AppConfig {
        AppConfig {
            environment: EnvironmentConfig {
                name: "development".to_string(),
                log_level: "info".to_string(),
                log_format: "pretty".to_string(),
                log_directory: None,
            },
            database: DatabaseConfig {
                url: String::new(),
                settings_table: "user_settings".to_string(),
                max_connections: 20,
                min_connections: 2,
                connection_timeout_ms: 5000,
                idle_timeout_ms: 300000,
                slow_query_threshold_ms: 1000,
            },
            bot_service: BotServiceConfig {
                base_url: "http://localhost:8001".to_string(),
                request_timeout_ms: 10000,
                connect_timeout_ms: 5000,
            },
            sync: SyncConfig::default(),
            recovery: RecoveryConfig::default(),
            pricing: PricingConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to load configuration with default settings
pub async fn load_config() -> AppResult<AppConfig> {
    ConfigLoader::new().load().await
}

/// Load configuration with CLI arguments
pub async fn load_config_with_args(cli_args: CliArgs) -> AppResult<AppConfig> {
    ConfigLoader::new().with_cli_args(cli_args).load().await
}

/// Load configuration from a specific path
pub async fn load_config_from_path<P: AsRef<Path>>(path: P) -> AppResult<AppConfig> {
    ConfigLoader::new().with_config_path(path).load().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn cli_args() -> CliArgs {
        CliArgs {
            config_path: None,
            log_level: Some("debug".to_string()),
            log_format: Some("json".to_string()),
            environment: Some("test".to_string()),
            wallets: vec!["11111111111111111111111111111112".to_string()],
            auto_reconcile: true,
            interval_secs: Some(5),
            once: false,
            metrics_port: Some(9999),
        }
    }

    #[tokio::test]
    async fn test_load_default_config_when_file_missing() {
        let loader = ConfigLoader::new()
            .with_config_path("/definitely/not/here.toml")
            .without_env();
        let config = loader.load().await.unwrap();

        assert_eq!(config.environment.name, "development");
        assert!(config.is_development());
        assert_eq!(config.bot_service.base_url, "http://localhost:8001");
    }

    #[tokio::test]
    async fn test_load_from_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
[environment]
name = "staging"
log_level = "warn"
log_format = "json"

[database]
url = "postgres://db/settings"
settings_table = "wallet_settings"

[bot_service]
base_url = "http://bot:8001"

[sync]
retry_step_ms = 250
"#,
        )
        .await
        .unwrap();

        let config = ConfigLoader::new().with_config_path(&path).without_env().load().await.unwrap();

        assert_eq!(config.environment.name, "staging");
        assert_eq!(config.database.settings_table, "wallet_settings");
        assert_eq!(config.sync.retry_step_ms, 250);
        assert_eq!(config.sync.verification_retries, 3);
    }

    #[tokio::test]
    async fn test_malformed_toml_is_a_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        tokio::fs::write(&path, "[environment\nname = ").await.unwrap();

        let result = ConfigLoader::new().with_config_path(&path).without_env().load().await;
        assert!(matches!(result, Err(AppError::Config { .. })));
    }

    #[tokio::test]
    async fn test_cli_overrides() {
        let loader = ConfigLoader::new()
            .with_config_path("/definitely/not/here.toml")
            .with_cli_args(cli_args())
            .without_env();

        let config = loader.load().await.unwrap();

        assert_eq!(config.environment.log_level, "debug");
        assert_eq!(config.environment.log_format, "json");
        assert_eq!(config.environment.name, "test");
        assert!(config.sync.auto_reconcile);
        assert_eq!(config.sync.reconcile_interval_secs, 5);
        assert_eq!(config.sync.wallets.len(), 1);
        assert_eq!(config.monitoring.metrics_port, 9999);
    }

    #[tokio::test]
    async fn test_file_logging_settings_survive_bare_cli() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
[environment]
name = "staging"
log_level = "debug"
log_format = "json"

[database]
url = "postgres://db/settings"

[bot_service]
base_url = "http://bot:8001"

[monitoring]
metrics_port = 9300
"#,
        )
        .await
        .unwrap();

        let args = CliArgs::try_parse_from(["risk-sync"]).unwrap();
        let config = ConfigLoader::new()
            .with_config_path(&path)
            .with_cli_args(args)
            .without_env()
            .load()
            .await
            .unwrap();

        assert_eq!(config.environment.log_level, "debug");
        assert_eq!(config.environment.log_format, "json");
        assert_eq!(config.monitoring.metrics_port, 9300);
    }

    #[test]
    fn test_environment_variable_override() {
        env::set_var("RSYNC_TEST_BOT_SERVICE_URL", "http://bot.internal:8001");
        env::set_var("RSYNC_TEST_WALLETS", "11111111111111111111111111111112, 11111111111111111111111111111113");

        let loader = ConfigLoader::new().with_env_prefix("RSYNC_TEST");
        let mut config = loader.create_default_config();
        let result = loader.apply_environment_overrides(&mut config);

        env::remove_var("RSYNC_TEST_BOT_SERVICE_URL");
        env::remove_var("RSYNC_TEST_WALLETS");

        assert!(result.is_ok());
        assert_eq!(config.bot_service.base_url, "http://bot.internal:8001");
        assert_eq!(config.sync.wallets.len(), 2);
    }
}
