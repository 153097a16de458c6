//! PostgreSQL database service implementation
//!
//! This module provides the connection pool shared by the settings-table
//! stores, plus health checks and pool statistics.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::errors::to_app_error;
use crate::application::health::ComponentHealth;
use crate::config::models::DatabaseConfig;
use crate::core::error::AppError;
use crate::core::result::AppResult;

/// PostgreSQL connection pool type alias
pub type PostgresPool = PgPool;

/// PostgreSQL service
#[derive(Debug, Clone)]
pub struct PostgresService {
    /// Connection pool
    pool: PgPool,
    /// Database configuration
    config: DatabaseConfig,
}

impl PostgresService {
    /// Create a new PostgreSQL service with connection pool
    #[instrument(skip(config))]
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        info!("🐘 Initializing PostgreSQL connection pool");

        if config.url.is_empty() {
            return Err(AppError::database("PostgreSQL URL is required", "connection"));
        }

        let connect_options = config
            .url
            .parse::<PgConnectOptions>()
            .map_err(|e| AppError::config(format!("Failed to parse PostgreSQL connection string: {}", e)))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_millis(config.connection_timeout_ms))
            .idle_timeout(Duration::from_millis(config.idle_timeout_ms))
            .max_lifetime(Duration::from_secs(1800))
            .test_before_acquire(true)
            .connect_with(connect_options)
            .await
            .map_err(|e| to_app_error(&e, "connection_pool"))?;

        info!("✅ PostgreSQL connection pool established");
        info!(
            "📊 Pool configuration: max={}, min={}",
            config.max_connections, config.min_connections
        );

        Ok(Self::from_pool(pool, config))
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool, config: &DatabaseConfig) -> Self {
        Self {
            pool,
            config: config.clone(),
        }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Settings table name
    pub fn settings_table(&self) -> &str {
        &self.config.settings_table
    }

    /// Threshold above which statements are reported as slow
    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.config.slow_query_threshold_ms)
    }

    /// Log a statement that exceeded the slow-query threshold
    pub fn observe_query(&self, operation: &str, elapsed: Duration) {
        if elapsed > self.slow_query_threshold() {
            warn!("🐌 Slow query detected: {} took {}ms", operation, elapsed.as_millis());
        } else {
            debug!("📊 {} executed in {}ms", operation, elapsed.as_millis());
        }
    }

    /// Close all connections in the pool
    pub async fn close(&self) -> AppResult<()> {
        info!("🔌 Closing PostgreSQL connection pool");
        self.pool.close().await;
        info!("✅ PostgreSQL connection pool closed");
        Ok(())
    }

    /// Execute a health check query
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> ComponentHealth {
        let mut component = ComponentHealth::new("postgres".to_string(), true);
        let start_time = Instant::now();

        match self.execute_health_check_query().await {
            Ok(_) => {
                let response_time = start_time.elapsed().as_millis() as u64;
                component.mark_healthy(Some("Database connection healthy".to_string()), Some(response_time));
            }
            Err(e) => {
                component.mark_unhealthy(format!("Database health check failed: {}", e));
            }
        }

        component
    }

    /// Execute the actual health check query
    async fn execute_health_check_query(&self) -> AppResult<()> {
        let result = sqlx::query("SELECT 1 AS health_check")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| to_app_error(&e, "health_check"))?;

        let health_value: i32 = result
            .try_get("health_check")
            .map_err(|e| to_app_error(&e, "health_check"))?;

        if health_value != 1 {
            return Err(AppError::database(
                "Health check returned unexpected value",
                "health_check",
            ));
        }

        Ok(())
    }

    /// Get pool statistics
    pub fn statistics(&self) -> PoolStatistics {
        let pool_size = self.pool.size();
        let idle_connections = self.pool.num_idle() as u32;

        PoolStatistics {
            pool_size,
            idle_connections,
            active_connections: pool_size.saturating_sub(idle_connections),
        }
    }
}

/// Connection pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatistics {
    /// Current pool size
    pub pool_size: u32,
    /// Number of idle connections
    pub idle_connections: u32,
    /// Number of connections checked out
    pub active_connections: u32,
}
