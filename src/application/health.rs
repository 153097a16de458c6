//! Health monitoring service
//!
//! This module tracks the health of the configuration, the settings database,
//! the bot service, the database recovery manager and the price validator,
//! and rolls them up into one overall status.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn, error, instrument};
use chrono::{DateTime, Utc};

use crate::config::AppConfig;
use crate::core::result::AppResult;
use crate::infrastructure::database::{DatabaseRecovery, PostgresService};
use crate::services::bot_service::BotServiceClient;
use crate::services::pricing::PriceValidator;

/// Overall system health status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// All components are healthy
    Healthy,
    /// Some non-critical components are unhealthy
    Degraded,
    /// Critical components are unhealthy
    Unhealthy,
    /// System is starting up
    Starting,
}

/// Health status of an individual component
#[derive(Debug, Clone)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,

    /// Current health status
    pub status: HealthStatus,

    /// Health check message
    pub message: Option<String>,

    /// Last successful health check
    pub last_success: Option<DateTime<Utc>>,

    /// Last health check attempt
    pub last_check: DateTime<Utc>,

    /// Number of consecutive failures
    pub consecutive_failures: u32,

    /// Whether this component is critical for overall system health
    pub is_critical: bool,

    /// Response time for last health check (in milliseconds)
    pub response_time_ms: Option<u64>,
}

impl ComponentHealth {
    /// Create a new component health status
    pub fn new(name: String, is_critical: bool) -> Self {
        Self {
            name,
            status: HealthStatus::Starting,
            message: None,
            last_success: None,
            last_check: Utc::now(),
            consecutive_failures: 0,
            is_critical,
            response_time_ms: None,
        }
    }

    /// Mark component as healthy
    pub fn mark_healthy(&mut self, message: Option<String>, response_time_ms: Option<u64>) {
        self.status = HealthStatus::Healthy;
        self.message = message;
        self.last_success = Some(Utc::now());
        self.last_check = Utc::now();
        self.consecutive_failures = 0;
        self.response_time_ms = response_time_ms;
    }

    /// Mark component as unhealthy
    pub fn mark_unhealthy(&mut self, message: String) {
        self.status = HealthStatus::Unhealthy;
        self.message = Some(message);
        self.last_check = Utc::now();
        self.consecutive_failures += 1;
        self.response_time_ms = None;
    }

    /// Mark component as degraded
    pub fn mark_degraded(&mut self, message: String, response_time_ms: Option<u64>) {
        self.status = HealthStatus::Degraded;
        self.message = Some(message);
        self.last_check = Utc::now();
        self.response_time_ms = response_time_ms;
    }

    /// Fold a fresh health check result into the tracked entry, keeping history
    fn absorb(&mut self, check: ComponentHealth) {
        match check.status {
            HealthStatus::Healthy => self.mark_healthy(check.message, check.response_time_ms),
            HealthStatus::Degraded => self.mark_degraded(
                check.message.unwrap_or_default(),
                check.response_time_ms,
            ),
            HealthStatus::Unhealthy => self.mark_unhealthy(check.message.unwrap_or_default()),
            HealthStatus::Starting => {}
        }
    }
}

/// Health monitoring service
#[derive(Debug, Clone)]
pub struct HealthService {
    /// Application configuration
    config: Arc<AppConfig>,

    /// Component health statuses
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,

    /// Settings database
    postgres: Option<PostgresService>,

    /// Bot microservice
    bot_service: Option<BotServiceClient>,

    /// Database recovery manager
    recovery: Option<Arc<DatabaseRecovery>>,

    /// Price quote validator
    price_validator: Option<Arc<PriceValidator>>,

    /// Whether the service is running
    is_running: Arc<RwLock<bool>>,
}

impl HealthService {
    /// Create a new health service
    pub fn new(config: Arc<AppConfig>) -> Self {
        let mut components = HashMap::new();
        components.insert("config".to_string(), ComponentHealth::new("config".to_string(), true));
        components.insert("metrics".to_string(), ComponentHealth::new("metrics".to_string(), false));

        Self {
            config,
            components: Arc::new(RwLock::new(components)),
            postgres: None,
            bot_service: None,
            recovery: None,
            price_validator: None,
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// Monitor the settings database
    pub fn with_postgres(mut self, postgres: PostgresService) -> Self {
        self.register("postgres", true);
        self.postgres = Some(postgres);
        self
    }

    /// Monitor the bot microservice
    pub fn with_bot_service(mut self, client: BotServiceClient) -> Self {
        // two healthy stores still reach quorum
        self.register("bot_service", false);
        self.bot_service = Some(client);
        self
    }

    /// Monitor the database recovery manager
    pub fn with_recovery(mut self, recovery: Arc<DatabaseRecovery>) -> Self {
        self.register("db_recovery", false);
        self.recovery = Some(recovery);
        self
    }

    /// Report open price breakers
    pub fn with_price_validator(mut self, validator: Arc<PriceValidator>) -> Self {
        self.register("price_validator", false);
        self.price_validator = Some(validator);
        self
    }

    fn register(&mut self, name: &str, is_critical: bool) {
        // only called while building, before the map is shared
        if let Some(components) = Arc::get_mut(&mut self.components) {
            components
                .get_mut()
                .insert(name.to_string(), ComponentHealth::new(name.to_string(), is_critical));
        }
    }

    /// Start the health monitoring service
    #[instrument(skip(self))]
    pub async fn start(&self) -> AppResult<()> {
        debug!("🔍 Starting health monitoring service");

        {
            let mut running = self.is_running.write().await;
            *running = true;
        }

        // Perform initial health checks
        self.check_all_components().await;

        let service = self.clone();
        tokio::spawn(async move {
            let interval = std::time::Duration::from_secs(
                service.config.monitoring.health_check_interval_seconds.max(1),
            );
            let mut interval_timer = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

            loop {
                interval_timer.tick().await;

                if !service.is_running().await {
                    break;
                }

                service.check_all_components().await;
                match service.get_overall_health().await {
                    HealthStatus::Unhealthy => error!("❌ System unhealthy - critical components failed"),
                    HealthStatus::Degraded => warn!("⚠️  System degraded - some components unhealthy"),
                    _ => debug!("✅ All systems healthy"),
                }
            }

            debug!("Health monitoring service stopped");
        });

        debug!("✅ Health monitoring service started");
        Ok(())
    }

    /// Stop the health monitoring service
    pub async fn stop(&self) -> AppResult<()> {
        debug!("🛑 Stopping health monitoring service");

        {
            let mut running = self.is_running.write().await;
            *running = false;
        }

        debug!("✅ Health monitoring service stopped");
        Ok(())
    }

    /// Get the overall system health status
    pub async fn get_overall_health(&self) -> HealthStatus {
        let components = self.components.read().await;

        let mut has_critical_failure = false;
        let mut has_degraded = false;
        let mut all_starting = true;

        for component in components.values() {
            match component.status {
                HealthStatus::Unhealthy if component.is_critical => {
                    has_critical_failure = true;
                }
                HealthStatus::Unhealthy | HealthStatus::Degraded => {
                    has_degraded = true;
                }
                HealthStatus::Healthy => {
                    all_starting = false;
                }
                HealthStatus::Starting => {}
            }
        }

        if has_critical_failure {
            HealthStatus::Unhealthy
        } else if has_degraded {
            HealthStatus::Degraded
        } else if all_starting {
            HealthStatus::Starting
        } else {
            HealthStatus::Healthy
        }
    }

    /// Get health status for a specific component
    pub async fn get_component_health(&self, component_name: &str) -> Option<ComponentHealth> {
        let components = self.components.read().await;
        components.get(component_name).cloned()
    }

    /// Get health status for all components
    pub async fn get_all_component_health(&self) -> HashMap<String, ComponentHealth> {
        let components = self.components.read().await;
        components.clone()
    }

    /// Check all components health
    pub async fn check_all_components(&self) {
        debug!("🔍 Performing health checks on all components");

        self.check_config_health().await;
        self.check_metrics_health().await;

        if let Some(postgres) = &self.postgres {
            let check = postgres.health_check().await;
            self.record("postgres", check).await;
        }

        if let Some(client) = &self.bot_service {
            let check = client.health_check().await;
            self.record("bot_service", check).await;
        }

        if let Some(recovery) = &self.recovery {
            self.record("db_recovery", recovery.health_check()).await;
        }

        if let Some(validator) = &self.price_validator {
            self.record("price_validator", validator.health_check()).await;
        }

        debug!("✅ Health checks completed");
    }

    async fn record(&self, name: &str, check: ComponentHealth) {
        let mut components = self.components.write().await;
        if let Some(component) = components.get_mut(name) {
            component.absorb(check);
        }
    }

    /// Check configuration health
    async fn check_config_health(&self) {
        let start_time = std::time::Instant::now();

        let validation_result = self.config.validate();
        let response_time = start_time.elapsed().as_millis() as u64;

        let mut components = self.components.write().await;
        if let Some(component) = components.get_mut("config") {
            match validation_result {
                Ok(result) if result.is_valid && result.warnings.is_empty() => {
                    component.mark_healthy(
                        Some("Configuration is valid".to_string()),
                        Some(response_time),
                    );
                }
                Ok(result) if result.is_valid => {
                    let message = format!("Configuration has warnings: {:?}", result.warnings);
                    component.mark_degraded(message, Some(response_time));
                }
                Ok(result) => {
                    component.mark_unhealthy(format!("Configuration invalid: {:?}", result.errors));
                }
                Err(e) => {
                    component.mark_unhealthy(format!("Configuration validation failed: {}", e));
                }
            }
        }
    }

    /// Check metrics system health
    async fn check_metrics_health(&self) {
        let mut components = self.components.write().await;
        if let Some(component) = components.get_mut("metrics") {
            if self.config.monitoring.enable_metrics {
                component.mark_healthy(
                    Some(format!("Metrics exported on port {}", self.config.monitoring.metrics_port)),
                    None,
                );
            } else {
                component.mark_degraded("Metrics collection disabled".to_string(), None);
            }
        }
    }

    /// Get health summary as a formatted string
    pub async fn get_health_summary(&self) -> String {
        let overall_status = self.get_overall_health().await;
        let components = self.components.read().await;

        let mut summary = format!("Overall Status: {:?}\n\nComponents:\n", overall_status);

        let mut names: Vec<&String> = components.keys().collect();
        names.sort();

        for name in names {
            let component = &components[name];
            let status_emoji = match component.status {
                HealthStatus::Healthy => "✅",
                HealthStatus::Degraded => "⚠️",
                HealthStatus::Unhealthy => "❌",
                HealthStatus::Starting => "🔄",
            };

            let criticality = if component.is_critical { " (Critical)" } else { "" };

            summary.push_str(&format!(
                "{} {}{}: {:?}",
                status_emoji,
                name,
                criticality,
                component.status
            ));

            if let Some(ref message) = component.message {
                summary.push_str(&format!(" - {}", message));
            }

            if let Some(response_time) = component.response_time_ms {
                summary.push_str(&format!(" ({}ms)", response_time));
            }

            summary.push('\n');
        }

        summary
    }

    /// Check if the service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Degraded => write!(f, "Degraded"),
            HealthStatus::Unhealthy => write!(f, "Unhealthy"),
            HealthStatus::Starting => write!(f, "Starting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::{BotServiceConfig, RecoveryConfig};
    use crate::config::ConfigLoader;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> AppConfig {
        let mut config = ConfigLoader::new().without_env().create_default_config();
        config.database.url = "postgres://localhost/risk_sync_test".to_string();
        config
    }

    #[tokio::test]
    async fn test_health_service_creation() {
        let health_service = HealthService::new(Arc::new(test_config()));

        assert!(!health_service.is_running().await);

        let components = health_service.get_all_component_health().await;
        assert!(components.contains_key("config"));
        assert!(components.contains_key("metrics"));
        assert!(!components.contains_key("postgres"));
    }

    #[tokio::test]
    async fn test_component_health_lifecycle() {
        let mut component = ComponentHealth::new("test".to_string(), true);

        assert!(matches!(component.status, HealthStatus::Starting));
        assert_eq!(component.consecutive_failures, 0);

        component.mark_healthy(Some("All good".to_string()), Some(100));
        assert!(matches!(component.status, HealthStatus::Healthy));
        assert_eq!(component.consecutive_failures, 0);
        assert!(component.last_success.is_some());

        component.mark_unhealthy("Something failed".to_string());
        assert!(matches!(component.status, HealthStatus::Unhealthy));
        assert_eq!(component.consecutive_failures, 1);

        component.mark_unhealthy("Still failing".to_string());
        assert_eq!(component.consecutive_failures, 2);
    }

    #[tokio::test]
    async fn test_overall_health_calculation() {
        let health_service = HealthService::new(Arc::new(test_config()));

        let status = health_service.get_overall_health().await;
        assert!(matches!(status, HealthStatus::Starting));

        {
            let mut components = health_service.components.write().await;
            if let Some(component) = components.get_mut("config") {
                component.mark_unhealthy("Config broken".to_string());
            }
        }

        let status = health_service.get_overall_health().await;
        assert!(matches!(status, HealthStatus::Unhealthy));
    }

    #[tokio::test]
    async fn test_config_health_check() {
        let health_service = HealthService::new(Arc::new(test_config()));

        health_service.check_config_health().await;

        let component = health_service.get_component_health("config").await.unwrap();
        assert!(matches!(component.status, HealthStatus::Healthy));
    }

    #[tokio::test]
    async fn test_invalid_config_is_unhealthy() {
        let config = ConfigLoader::new().without_env().create_default_config();
        let health_service = HealthService::new(Arc::new(config));

        health_service.check_config_health().await;

        let component = health_service.get_component_health("config").await.unwrap();
        assert!(matches!(component.status, HealthStatus::Unhealthy));
    }

    #[tokio::test]
    async fn test_unreachable_bot_service_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = BotServiceClient::new(&BotServiceConfig {
            base_url: server.uri(),
            request_timeout_ms: 1000,
            connect_timeout_ms: 1000,
        })
        .unwrap();

        let health_service = HealthService::new(Arc::new(test_config()))
            .with_bot_service(client)
            .with_recovery(Arc::new(DatabaseRecovery::new(&RecoveryConfig::default())));

        health_service.check_all_components().await;

        let bot = health_service.get_component_health("bot_service").await.unwrap();
        assert!(matches!(bot.status, HealthStatus::Unhealthy));
        assert!(!bot.is_critical);

        let recovery = health_service.get_component_health("db_recovery").await.unwrap();
        assert!(matches!(recovery.status, HealthStatus::Healthy));

        assert_eq!(health_service.get_overall_health().await, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_health_summary_generation() {
        let health_service = HealthService::new(Arc::new(test_config()));

        health_service.check_all_components().await;

        let summary = health_service.get_health_summary().await;
        assert!(summary.contains("Overall Status: Healthy"));
        assert!(summary.contains("Components:"));
        assert!(summary.contains("config (Critical)"));
    }
}
