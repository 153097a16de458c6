//! Main application structure and lifecycle management
//!
//! This module contains the core Application struct that wires the stores,
//! the reconciliation service and the health service together and manages the
//! lifecycle from startup to shutdown.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, error, debug, instrument};

use crate::config::AppConfig;
use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::core::types::WalletAddress;
use crate::infrastructure::database::{DatabaseRecovery, PostgresService};
use crate::infrastructure::monitoring;
use crate::services::bot_service::BotServiceClient;
use crate::services::pricing::PriceValidator;
use crate::services::sync::{
    sweep, AutoReconciler, PostgresProfileStore, RiskProfileSyncService, SweepReport, SyncSettings,
};
use super::health::{HealthService, HealthStatus};

/// Main application state and coordinator
#[derive(Debug)]
pub struct Application {
    /// Application configuration
    config: Arc<AppConfig>,

    /// Health service for monitoring
    health_service: HealthService,

    /// Reconciliation service
    sync_service: Arc<RiskProfileSyncService>,

    /// Price quote validator
    price_validator: Arc<PriceValidator>,

    /// Wallets covered by the sweep
    wallets: Vec<WalletAddress>,

    /// Settings database, when connected
    postgres: Option<PostgresService>,

    /// Application state
    state: Arc<RwLock<ApplicationState>>,
}

/// Application runtime state
#[derive(Debug, Clone)]
pub struct ApplicationState {
    /// Whether the application is running
    pub is_running: bool,

    /// Whether the application is shutting down
    pub is_shutting_down: bool,

    /// Start timestamp
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Last health check timestamp
    pub last_health_check: Option<chrono::DateTime<chrono::Utc>>,

    /// Current health status
    pub health_status: HealthStatus,

    /// Last completed sweep
    pub last_sweep: Option<SweepReport>,
}

impl Default for ApplicationState {
    fn default() -> Self {
        Self {
            is_running: false,
            is_shutting_down: false,
            started_at: chrono::Utc::now(),
            last_health_check: None,
            health_status: HealthStatus::Starting,
            last_sweep: None,
        }
    }
}

fn parse_wallets(config: &AppConfig) -> AppResult<Vec<WalletAddress>> {
    config
        .sync
        .wallets
        .iter()
        .map(|wallet| WalletAddress::new(wallet.as_str()))
        .collect()
}

impl Application {
    /// Build a new application instance with the given configuration
    #[instrument(skip(config))]
    pub async fn build(config: AppConfig) -> AppResult<Self> {
        info!("🏗️  Building application instance");

        // Validate configuration before proceeding
        let validation_result = config.validate()?;
        if !validation_result.is_valid {
            return Err(AppError::config(format!(
                "Configuration validation failed: {:?}",
                validation_result.errors
            )));
        }

        for warning in &validation_result.warnings {
            warn!("⚠️  Configuration warning: {}", warning);
        }

        let wallets = parse_wallets(&config)?;
        let config = Arc::new(config);

        let postgres = PostgresService::new(&config.database).await?;
        let recovery = Arc::new(DatabaseRecovery::new(&config.recovery));
        let bot_service = BotServiceClient::new(&config.bot_service)?;

        let sync_service = Arc::new(RiskProfileSyncService::new(
            Arc::new(PostgresProfileStore::frontend(postgres.clone())),
            Arc::new(bot_service.clone()),
            Arc::new(PostgresProfileStore::database_proxy(postgres.clone(), recovery.clone())),
            SyncSettings::from(&config.sync),
        ));

        if config.monitoring.enable_metrics {
            monitoring::install_prometheus(config.monitoring.metrics_port)?;
        } else {
            monitoring::describe_metrics();
        }

        let price_validator = Arc::new(PriceValidator::new(config.pricing.clone()));
        let health_service = HealthService::new(config.clone())
            .with_postgres(postgres.clone())
            .with_bot_service(bot_service)
            .with_recovery(recovery)
            .with_price_validator(price_validator.clone());

        let app = Self {
            price_validator,
            config,
            health_service,
            sync_service,
            wallets,
            postgres: Some(postgres),
            state: Arc::new(RwLock::new(ApplicationState::default())),
        };

        info!("✅ Application instance built successfully");
        Ok(app)
    }

    /// Build around an existing reconciliation service, without connecting
    /// to the database or installing the metrics exporter
    pub fn with_service(config: AppConfig, sync_service: Arc<RiskProfileSyncService>) -> AppResult<Self> {
        let wallets = parse_wallets(&config)?;
        let config = Arc::new(config);

        let price_validator = Arc::new(PriceValidator::new(config.pricing.clone()));

        Ok(Self {
            health_service: HealthService::new(config.clone()).with_price_validator(price_validator.clone()),
            price_validator,
            config,
            sync_service,
            wallets,
            postgres: None,
            state: Arc::new(RwLock::new(ApplicationState::default())),
        })
    }

    /// Run until `shutdown` is cancelled
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, shutdown: CancellationToken) -> AppResult<()> {
        info!("🚀 Starting risk profile sync service");

        {
            let mut state = self.state.write().await;
            state.is_running = true;
        }

        self.health_service.start().await?;

        let reconciler = if self.config.sync.auto_reconcile {
            if self.wallets.is_empty() {
                warn!("⚠️  Auto reconciliation enabled without wallets; nothing to sweep");
                None
            } else {
                Some(AutoReconciler::start(
                    self.sync_service.clone(),
                    self.wallets.clone(),
                    self.config.sync.reconcile_interval(),
                ))
            }
        } else {
            None
        };

        info!("✅ All services started successfully");
        info!("🎯 Risk profile sync is now running in {} mode", self.config.environment.name);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    if self.is_shutting_down().await {
                        break;
                    }
                    self.perform_health_check().await;
                }
            }
        }

        if let Some(reconciler) = reconciler {
            reconciler.stop().await;
        }

        self.shutdown().await?;

        info!("👋 Risk profile sync stopped");
        Ok(())
    }

    /// Sweep the configured wallets once
    pub async fn reconcile_once(&self) -> SweepReport {
        let report = sweep(&self.sync_service, &self.wallets).await;
        self.state.write().await.last_sweep = Some(report.clone());
        report
    }

    /// Refresh the cached health status
    async fn perform_health_check(&self) {
        let health_status = self.health_service.get_overall_health().await;

        let previous = {
            let mut state = self.state.write().await;
            state.last_health_check = Some(chrono::Utc::now());
            std::mem::replace(&mut state.health_status, health_status)
        };

        if previous == health_status {
            return;
        }

        match health_status {
            HealthStatus::Healthy => {
                debug!("✅ All systems healthy");
            }
            HealthStatus::Degraded => {
                warn!("⚠️  System degraded - some components unhealthy");
            }
            HealthStatus::Unhealthy => {
                error!("❌ System unhealthy - critical components failed");
            }
            HealthStatus::Starting => {
                debug!("🔄 System starting up");
            }
        }
    }

    /// Initiate graceful shutdown
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> AppResult<()> {
        {
            let mut state = self.state.write().await;
            if state.is_shutting_down && !state.is_running {
                return Ok(());
            }
            state.is_shutting_down = true;
            state.is_running = false;
        }

        info!("🛑 Initiating graceful shutdown");

        if let Err(e) = self.health_service.stop().await {
            warn!("Failed to stop health service cleanly: {}", e);
        }

        if let Some(postgres) = &self.postgres {
            postgres.close().await?;
        }

        info!("✅ Graceful shutdown completed");
        Ok(())
    }

    /// Get current application state
    pub async fn get_state(&self) -> ApplicationState {
        self.state.read().await.clone()
    }

    /// Get application configuration
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// Reconciliation service
    pub fn sync_service(&self) -> &Arc<RiskProfileSyncService> {
        &self.sync_service
    }

    /// Price quote validator; its breakers show up in the health summary
    pub fn price_validator(&self) -> &Arc<PriceValidator> {
        &self.price_validator
    }

    /// Health service
    pub fn health_service(&self) -> &HealthService {
        &self.health_service
    }

    /// Wallets covered by the sweep
    pub fn wallets(&self) -> &[WalletAddress] {
        &self.wallets
    }

    /// Check if application is running
    pub async fn is_running(&self) -> bool {
        self.state.read().await.is_running
    }

    /// Check if application is shutting down
    pub async fn is_shutting_down(&self) -> bool {
        self.state.read().await.is_shutting_down
    }

    /// Get current health status
    pub async fn get_health_status(&self) -> HealthStatus {
        self.state.read().await.health_status
    }

    /// Get application uptime
    pub async fn get_uptime(&self) -> chrono::Duration {
        let state = self.state.read().await;
        chrono::Utc::now() - state.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use crate::core::types::{ProfileSource, RiskProfile};
    use crate::services::sync::{MemoryProfileStore, ProfileStore};
    use chrono::Utc;

    const WALLET: &str = "11111111111111111111111111111112";

    struct Harness {
        frontend: Arc<MemoryProfileStore>,
        database: Arc<MemoryProfileStore>,
        service: Arc<RiskProfileSyncService>,
    }

    fn harness() -> Harness {
        let frontend = Arc::new(MemoryProfileStore::new(ProfileSource::Frontend));
        let bot = Arc::new(MemoryProfileStore::new(ProfileSource::BotService));
        let database = Arc::new(MemoryProfileStore::new(ProfileSource::Database));
        let service = Arc::new(RiskProfileSyncService::new(
            frontend.clone(),
            bot,
            database.clone(),
            SyncSettings {
                retry_step: Duration::from_millis(1),
                ..SyncSettings::default()
            },
        ));
        Harness {
            frontend,
            database,
            service,
        }
    }

    fn test_config() -> AppConfig {
        let mut config = ConfigLoader::new().without_env().create_default_config();
        config.database.url = "postgres://localhost/risk_sync_test".to_string();
        config.sync.wallets = vec![WALLET.to_string()];
        config
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let config = ConfigLoader::new().without_env().create_default_config();

        let result = Application::build(config).await;
        assert!(matches!(result, Err(AppError::Config { .. })));
    }

    #[tokio::test]
    async fn test_invalid_wallet_is_rejected() {
        let mut config = test_config();
        config.sync.wallets = vec!["not-a-wallet".to_string()];

        assert!(Application::with_service(config, harness().service).is_err());
    }

    #[tokio::test]
    async fn test_application_state() {
        let app = Application::with_service(test_config(), harness().service).unwrap();

        let state = app.get_state().await;
        assert!(!state.is_running);
        assert!(!state.is_shutting_down);
        assert!(state.last_sweep.is_none());
        assert!(matches!(state.health_status, HealthStatus::Starting));
        assert_eq!(app.wallets().len(), 1);
    }

    #[tokio::test]
    async fn test_open_price_breaker_shows_in_health() {
        let app = Application::with_service(test_config(), harness().service).unwrap();

        let quote = crate::services::pricing::PriceQuote {
            token: "SOL".to_string(),
            price: 0.0,
            timestamp: Utc::now(),
            volume_24h: None,
            source: "test".to_string(),
        };
        for _ in 0..3 {
            app.price_validator().validate(&quote);
        }

        app.health_service().check_all_components().await;
        let component = app
            .health_service()
            .get_component_health("price_validator")
            .await
            .unwrap();
        assert!(matches!(component.status, HealthStatus::Degraded));
        assert!(!component.is_critical);
    }

    #[tokio::test]
    async fn test_reconcile_once() {
        let h = harness();
        let wallet = WalletAddress::new(WALLET).unwrap();
        h.frontend.seed(&wallet, "Aggressive", None, Utc::now());
        h.database.seed(&wallet, "conservative", None, Utc::now());

        let app = Application::with_service(test_config(), h.service.clone()).unwrap();
        let report = app.reconcile_once().await;

        assert_eq!(report.checked, 1);
        assert_eq!(report.reconciled, 1);
        assert_eq!(app.get_state().await.last_sweep, Some(report));

        let record = h.database.fetch(&wallet).await.unwrap().unwrap();
        assert_eq!(record.risk_profile, RiskProfile::Aggressive);
    }

    #[tokio::test]
    async fn test_run_reconciles_until_shutdown() {
        let h = harness();
        let wallet = WalletAddress::new(WALLET).unwrap();
        h.frontend.seed(&wallet, "Balanced", None, Utc::now());
        h.database.seed(&wallet, "Aggressive", None, Utc::now());

        let mut config = test_config();
        config.sync.auto_reconcile = true;
        config.sync.reconcile_interval_secs = 1;

        let app = Application::with_service(config, h.service.clone()).unwrap();
        let shutdown = CancellationToken::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        app.run(shutdown).await.unwrap();

        assert!(app.is_shutting_down().await);
        assert!(!app.is_running().await);

        let record = h.database.fetch(&wallet).await.unwrap().unwrap();
        assert_eq!(record.risk_profile, RiskProfile::Balanced);
    }

    #[tokio::test]
    async fn test_application_shutdown() {
        let app = Application::with_service(test_config(), harness().service).unwrap();

        assert!(app.shutdown().await.is_ok());
        assert!(app.is_shutting_down().await);
        assert!(!app.is_running().await);

        // second call is a no-op
        assert!(app.shutdown().await.is_ok());
    }
}
