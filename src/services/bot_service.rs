//! Bot microservice client
//!
//! Reads and writes a wallet's trading configuration on the bot service over
//! HTTP. The bot speaks lowercase profile names and calls the middle profile
//! `moderate`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::application::health::ComponentHealth;
use crate::config::models::BotServiceConfig;
use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::core::types::{ProfileSource, RiskProfile, RiskProfileRecord, WalletAddress};
use crate::services::sync::ProfileStore;

const SERVICE_NAME: &str = "bot_service";

/// Configuration payload returned by `GET /api/v1/bot/configuration/{wallet}`
#[derive(Debug, Clone, Deserialize)]
struct BotConfiguration {
    risk_profile: String,
    #[serde(default)]
    max_trade_amount: Option<Decimal>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

/// Body of `PUT /api/v1/bot/configuration/{wallet}`
#[derive(Debug, Clone, Serialize)]
struct BotConfigurationUpdate<'a> {
    risk_profile: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_trade_amount: Option<Decimal>,
}

/// HTTP client for the bot microservice
#[derive(Debug, Clone)]
pub struct BotServiceClient {
    /// HTTP client
    http_client: Client,
    /// Base URL without trailing slash
    base_url: String,
}

impl BotServiceClient {
    /// Create a new client
    pub fn new(config: &BotServiceConfig) -> AppResult<Self> {
        info!("🤖 Initializing bot service client for {}", config.base_url);

        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn configuration_url(&self, wallet: &WalletAddress) -> String {
        format!("{}/api/v1/bot/configuration/{}", self.base_url, wallet)
    }

    /// Turn a non-success response into an `ExternalService` error
    async fn error_for(response: reqwest::Response, action: &str) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        AppError::external(
            SERVICE_NAME,
            format!("{} returned {}: {}", action, status, body.trim()),
            Some(status.as_u16()),
        )
    }

    /// Health check against `GET {base}/health`
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> ComponentHealth {
        let mut component = ComponentHealth::new(SERVICE_NAME.to_string(), true);
        let start_time = Instant::now();

        match self.http_client.get(format!("{}/health", self.base_url)).send().await {
            Ok(response) if response.status().is_success() => {
                component.mark_healthy(
                    Some("Bot service reachable".to_string()),
                    Some(start_time.elapsed().as_millis() as u64),
                );
            }
            Ok(response) => {
                component.mark_unhealthy(format!("Bot service unhealthy: status {}", response.status()));
            }
            Err(e) => {
                component.mark_unhealthy(format!("Bot service unreachable: {}", e));
            }
        }

        component
    }
}

#[async_trait]
impl ProfileStore for BotServiceClient {
    fn source(&self) -> ProfileSource {
        ProfileSource::BotService
    }

    #[instrument(skip(self))]
    async fn fetch(&self, wallet: &WalletAddress) -> AppResult<Option<RiskProfileRecord>> {
        let response = self.http_client.get(self.configuration_url(wallet)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("🤖 No bot configuration for {}", wallet.short());
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_for(response, "GET configuration").await);
        }

        let body: BotConfiguration = response.json().await.map_err(|e| {
            AppError::external(SERVICE_NAME, format!("Malformed configuration payload: {}", e), None)
        })?;

        let risk_profile = RiskProfile::normalize(&body.risk_profile)?;

        // The bot does not always report a change time; treat the value as current
        let last_updated = body.last_updated.unwrap_or_else(Utc::now);

        Ok(Some(RiskProfileRecord::new(
            risk_profile,
            body.max_trade_amount,
            last_updated,
            ProfileSource::BotService,
        )))
    }

    #[instrument(skip(self))]
    async fn store(
        &self,
        wallet: &WalletAddress,
        risk_profile: RiskProfile,
        investment_amount: Option<Decimal>,
    ) -> AppResult<()> {
        let update = BotConfigurationUpdate {
            risk_profile: risk_profile.as_bot_str(),
            max_trade_amount: investment_amount,
        };

        let response = self
            .http_client
            .put(self.configuration_url(wallet))
            .json(&update)
            .send()
            .await?;

        if !response.status().is_success() {
            let error = Self::error_for(response, "PUT configuration").await;
            warn!("⚠️  Bot service rejected update for {}: {}", wallet.short(), error);
            return Err(error);
        }

        debug!("🤖 Bot configuration updated for {}", wallet.short());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WALLET: &str = "11111111111111111111111111111112";

    fn wallet() -> WalletAddress {
        WalletAddress::new(WALLET).unwrap()
    }

    fn client_for(server: &MockServer) -> BotServiceClient {
        BotServiceClient::new(&BotServiceConfig {
            base_url: format!("{}/", server.uri()),
            request_timeout_ms: 2000,
            connect_timeout_ms: 1000,
        })
        .unwrap()
    }

    fn config_path() -> String {
        format!("/api/v1/bot/configuration/{}", WALLET)
    }

    #[tokio::test]
    async fn test_fetch_normalizes_bot_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(config_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "risk_profile": "moderate",
                "max_trade_amount": 2.5,
                "last_updated": "2026-01-02T03:04:05Z"
            })))
            .mount(&server)
            .await;

        let record = client_for(&server).fetch(&wallet()).await.unwrap().unwrap();

        assert_eq!(record.risk_profile, RiskProfile::Balanced);
        assert_eq!(record.investment_amount, Some(dec!(2.5)));
        assert_eq!(record.source, ProfileSource::BotService);
        assert_eq!(record.last_updated.to_rfc3339(), "2026-01-02T03:04:05+00:00");
    }

    #[tokio::test]
    async fn test_fetch_without_timestamp_uses_fetch_time() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(config_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "risk_profile": "aggressive" })))
            .mount(&server)
            .await;

        let before = Utc::now();
        let record = client_for(&server).fetch(&wallet()).await.unwrap().unwrap();

        assert_eq!(record.risk_profile, RiskProfile::Aggressive);
        assert!(record.last_updated >= before);
        assert!(record.investment_amount.is_none());
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(config_path()))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(client_for(&server).fetch(&wallet()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_unknown_profile_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(config_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "risk_profile": "yolo" })))
            .mount(&server)
            .await;

        let result = client_for(&server).fetch(&wallet()).await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_store_sends_bot_wire_form() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(config_path()))
            .and(body_json(json!({ "risk_profile": "moderate" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .store(&wallet(), RiskProfile::Balanced, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_store_failure_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(config_path()))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .store(&wallet(), RiskProfile::Conservative, Some(dec!(1)))
            .await
            .unwrap_err();

        match &error {
            AppError::ExternalService { status_code, message, .. } => {
                assert_eq!(*status_code, Some(503));
                assert!(message.contains("maintenance"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let health = client_for(&server).health_check().await;
        assert_eq!(health.name, "bot_service");
        assert_eq!(health.status, crate::application::health::HealthStatus::Healthy);
    }
}
