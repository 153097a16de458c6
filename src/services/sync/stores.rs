//! Profile stores
//!
//! The three sources of a wallet's risk profile sit behind [`ProfileStore`]:
//! the frontend user-settings path and the direct database proxy (both over
//! the settings table), and the bot microservice (see
//! [`crate::services::bot_service`]). [`MemoryProfileStore`] backs tests and
//! dry runs.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use sqlx::Row;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

#[cfg(test)]
use mockall::automock;

use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::core::types::{ProfileSource, RiskProfile, RiskProfileRecord, Timestamp, WalletAddress};
use crate::infrastructure::database::{to_app_error, DatabaseRecovery, PostgresService};

/// One store holding a risk profile per wallet
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Which source this store represents
    fn source(&self) -> ProfileSource;

    /// Read the current record; `None` when the wallet has none.
    ///
    /// A stored value that does not normalize is an error.
    async fn fetch(&self, wallet: &WalletAddress) -> AppResult<Option<RiskProfileRecord>>;

    /// Write the profile; a `None` amount leaves the stored amount untouched
    async fn store(
        &self,
        wallet: &WalletAddress,
        risk_profile: RiskProfile,
        investment_amount: Option<Decimal>,
    ) -> AppResult<()>;
}

/// Settings-table store over Postgres
#[derive(Debug, Clone)]
pub struct PostgresProfileStore {
    service: PostgresService,
    source: ProfileSource,
    recovery: Option<Arc<DatabaseRecovery>>,
    select_sql: String,
    upsert_sql: String,
}

impl PostgresProfileStore {
    /// Store used by the frontend user-settings path
    pub fn frontend(service: PostgresService) -> Self {
        Self::build(service, ProfileSource::Frontend, None)
    }

    /// Direct database path; every query runs through the recovery manager
    pub fn database_proxy(service: PostgresService, recovery: Arc<DatabaseRecovery>) -> Self {
        Self::build(service, ProfileSource::Database, Some(recovery))
    }

    fn build(service: PostgresService, source: ProfileSource, recovery: Option<Arc<DatabaseRecovery>>) -> Self {
        // table name is checked to be an identifier by the config validator
        let table = service.settings_table().to_string();
        let select_sql = format!(
            "SELECT risk_profile, investment_amount, updated_at FROM {} WHERE wallet_address = $1",
            table
        );
        let upsert_sql = format!(
            "INSERT INTO {table} (wallet_address, risk_profile, investment_amount, updated_at) \
             VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (wallet_address) DO UPDATE SET \
             risk_profile = EXCLUDED.risk_profile, \
             investment_amount = COALESCE(EXCLUDED.investment_amount, {table}.investment_amount), \
             updated_at = EXCLUDED.updated_at",
            table = table
        );

        Self {
            service,
            source,
            recovery,
            select_sql,
            upsert_sql,
        }
    }

    async fn run<T, F, Fut>(&self, operation: &str, mut query: F) -> AppResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, sqlx::Error>> + Send,
        T: Send,
    {
        let started = Instant::now();
        let result = match &self.recovery {
            Some(recovery) => recovery.execute(operation, query).await,
            None => query().await.map_err(|e| to_app_error(&e, operation)),
        };
        self.service.observe_query(operation, started.elapsed());
        result
    }
}

#[async_trait]
impl ProfileStore for PostgresProfileStore {
    fn source(&self) -> ProfileSource {
        self.source
    }

    #[instrument(skip(self), fields(source = %self.source))]
    async fn fetch(&self, wallet: &WalletAddress) -> AppResult<Option<RiskProfileRecord>> {
        let pool = self.service.pool();
        let row = self
            .run("fetch_profile", || {
                sqlx::query(&self.select_sql).bind(wallet.as_str()).fetch_optional(pool)
            })
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row
            .try_get("risk_profile")
            .map_err(|e| to_app_error(&e, "fetch_profile"))?;
        let investment_amount: Option<Decimal> = row
            .try_get("investment_amount")
            .map_err(|e| to_app_error(&e, "fetch_profile"))?;
        let last_updated: Timestamp = row
            .try_get("updated_at")
            .map_err(|e| to_app_error(&e, "fetch_profile"))?;

        let risk_profile = RiskProfile::normalize(&raw)?;

        Ok(Some(RiskProfileRecord::new(
            risk_profile,
            investment_amount,
            last_updated,
            self.source,
        )))
    }

    #[instrument(skip(self), fields(source = %self.source))]
    async fn store(
        &self,
        wallet: &WalletAddress,
        risk_profile: RiskProfile,
        investment_amount: Option<Decimal>,
    ) -> AppResult<()> {
        let pool = self.service.pool();
        self.run("store_profile", || {
            sqlx::query(&self.upsert_sql)
                .bind(wallet.as_str())
                .bind(risk_profile.as_str())
                .bind(investment_amount)
                .execute(pool)
        })
        .await?;

        debug!("💾 Stored {} for {} via {}", risk_profile, wallet.short(), self.source);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StoredValue {
    raw_profile: String,
    investment_amount: Option<Decimal>,
    last_updated: Timestamp,
}

/// In-process store with injectable failures
#[derive(Debug)]
pub struct MemoryProfileStore {
    source: ProfileSource,
    values: RwLock<HashMap<String, StoredValue>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    latency: RwLock<Option<Duration>>,
    writes: AtomicU64,
}

impl MemoryProfileStore {
    /// Create an empty store for `source`
    pub fn new(source: ProfileSource) -> Self {
        Self {
            source,
            values: RwLock::new(HashMap::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            latency: RwLock::new(None),
            writes: AtomicU64::new(0),
        }
    }

    /// Seed a raw value, bypassing normalization
    pub fn seed(
        &self,
        wallet: &WalletAddress,
        raw_profile: impl Into<String>,
        investment_amount: Option<Decimal>,
        last_updated: Timestamp,
    ) {
        self.values.write().insert(
            wallet.as_str().to_string(),
            StoredValue {
                raw_profile: raw_profile.into(),
                investment_amount,
                last_updated,
            },
        );
    }

    /// Make every read fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay every call
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Successful writes so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw stored profile string
    pub fn raw_profile(&self, wallet: &WalletAddress) -> Option<String> {
        self.values.read().get(wallet.as_str()).map(|v| v.raw_profile.clone())
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    fn source(&self) -> ProfileSource {
        self.source
    }

    async fn fetch(&self, wallet: &WalletAddress) -> AppResult<Option<RiskProfileRecord>> {
        self.simulate_latency().await;

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::network(format!("{} unavailable", self.source)));
        }

        let value = self.values.read().get(wallet.as_str()).cloned();
        match value {
            Some(value) => {
                let risk_profile = RiskProfile::normalize(&value.raw_profile)?;
                Ok(Some(RiskProfileRecord::new(
                    risk_profile,
                    value.investment_amount,
                    value.last_updated,
                    self.source,
                )))
            }
            None => Ok(None),
        }
    }

    async fn store(
        &self,
        wallet: &WalletAddress,
        risk_profile: RiskProfile,
        investment_amount: Option<Decimal>,
    ) -> AppResult<()> {
        self.simulate_latency().await;

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::network(format!("{} rejected the write", self.source)));
        }

        let raw_profile = match self.source {
            ProfileSource::BotService => risk_profile.as_bot_str(),
            _ => risk_profile.as_str(),
        };

        let mut values = self.values.write();
        let previous_amount = values.get(wallet.as_str()).and_then(|v| v.investment_amount);
        values.insert(
            wallet.as_str().to_string(),
            StoredValue {
                raw_profile: raw_profile.to_string(),
                investment_amount: investment_amount.or(previous_amount),
                last_updated: Utc::now(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn wallet() -> WalletAddress {
        WalletAddress::new("11111111111111111111111111111112").unwrap()
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryProfileStore::new(ProfileSource::Frontend);
        assert!(store.fetch(&wallet()).await.unwrap().is_none());

        store.store(&wallet(), RiskProfile::Aggressive, Some(dec!(3))).await.unwrap();

        let record = store.fetch(&wallet()).await.unwrap().unwrap();
        assert_eq!(record.risk_profile, RiskProfile::Aggressive);
        assert_eq!(record.investment_amount, Some(dec!(3)));
        assert_eq!(record.source, ProfileSource::Frontend);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_bot_store_keeps_wire_form() {
        let store = MemoryProfileStore::new(ProfileSource::BotService);
        store.store(&wallet(), RiskProfile::Balanced, None).await.unwrap();

        assert_eq!(store.raw_profile(&wallet()).as_deref(), Some("moderate"));
        assert_eq!(
            store.fetch(&wallet()).await.unwrap().unwrap().risk_profile,
            RiskProfile::Balanced
        );
    }

    #[tokio::test]
    async fn test_missing_amount_keeps_previous() {
        let store = MemoryProfileStore::new(ProfileSource::Database);
        store.store(&wallet(), RiskProfile::Conservative, Some(dec!(1.5))).await.unwrap();
        store.store(&wallet(), RiskProfile::Aggressive, None).await.unwrap();

        let record = store.fetch(&wallet()).await.unwrap().unwrap();
        assert_eq!(record.risk_profile, RiskProfile::Aggressive);
        assert_eq!(record.investment_amount, Some(dec!(1.5)));
    }

    #[tokio::test]
    async fn test_unrecognized_value_is_a_read_error() {
        let store = MemoryProfileStore::new(ProfileSource::Database);
        store.seed(&wallet(), "degen", None, Utc::now());

        let result = store.fetch(&wallet()).await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryProfileStore::new(ProfileSource::Frontend);
        store.set_fail_writes(true);
        assert!(store.store(&wallet(), RiskProfile::Balanced, None).await.is_err());
        assert_eq!(store.write_count(), 0);

        store.set_fail_reads(true);
        assert!(store.fetch(&wallet()).await.is_err());
    }

    async fn live_stores() -> (PostgresService, PostgresProfileStore, PostgresProfileStore, String) {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must point at a scratch database");
        let table = format!("risk_sync_test_{}", uuid::Uuid::new_v4().simple());

        let mut config = crate::config::ConfigLoader::new().without_env().create_default_config();
        config.database.url = url;
        config.database.settings_table = table.clone();

        let service = PostgresService::new(&config.database).await.unwrap();
        sqlx::query(&format!(
            "CREATE TABLE {} (wallet_address TEXT PRIMARY KEY, risk_profile TEXT NOT NULL, \
             investment_amount NUMERIC, updated_at TIMESTAMPTZ NOT NULL)",
            table
        ))
        .execute(service.pool())
        .await
        .unwrap();

        let recovery = Arc::new(DatabaseRecovery::new(&config.recovery));
        let frontend = PostgresProfileStore::frontend(service.clone());
        let database = PostgresProfileStore::database_proxy(service.clone(), recovery);
        (service, frontend, database, table)
    }

    async fn drop_table(service: &PostgresService, table: &str) {
        let _ = sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(service.pool())
            .await;
        let _ = service.close().await;
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn test_postgres_store_upsert_and_coalesce() {
        let (service, frontend, database, table) = live_stores().await;

        assert!(frontend.fetch(&wallet()).await.unwrap().is_none());

        frontend.store(&wallet(), RiskProfile::Conservative, Some(dec!(2.5))).await.unwrap();
        let record = database.fetch(&wallet()).await.unwrap().unwrap();
        assert_eq!(record.risk_profile, RiskProfile::Conservative);
        assert_eq!(record.investment_amount, Some(dec!(2.5)));
        assert_eq!(record.source, ProfileSource::Database);

        // upsert on the same wallet; a missing amount keeps the stored one
        database.store(&wallet(), RiskProfile::Aggressive, None).await.unwrap();
        let record = frontend.fetch(&wallet()).await.unwrap().unwrap();
        assert_eq!(record.risk_profile, RiskProfile::Aggressive);
        assert_eq!(record.investment_amount, Some(dec!(2.5)));

        let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(service.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);

        drop_table(&service, &table).await;
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn test_postgres_store_rejects_unrecognized_row() {
        let (service, frontend, database, table) = live_stores().await;

        sqlx::query(&format!(
            "INSERT INTO {} (wallet_address, risk_profile, investment_amount, updated_at) \
             VALUES ($1, 'degen', NULL, NOW())",
            table
        ))
        .bind(wallet().as_str())
        .execute(service.pool())
        .await
        .unwrap();

        assert!(matches!(frontend.fetch(&wallet()).await, Err(AppError::Validation { .. })));
        assert!(matches!(database.fetch(&wallet()).await, Err(AppError::Validation { .. })));

        drop_table(&service, &table).await;
    }
}
