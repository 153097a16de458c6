//! Risk Profile Sync Library
//!
//! Keeps a wallet's risk profile consistent across three independent stores
//! (frontend settings, the bot microservice and the database proxy), with
//! SQLSTATE-aware database recovery and price quote validation alongside.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │        Application lifecycle  •  Health monitoring          │
//! └─────────────────────────────────────────────────────────────┘
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Services Layer                          │
//! │   Sync (quorum writes, reconciliation, sweep)  •  Pricing   │
//! │   Bot service client                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Infrastructure Layer                       │
//! │   Postgres pool  •  SQLSTATE classifier  •  Recovery        │
//! │   Metrics exporter                                          │
//! └─────────────────────────────────────────────────────────────┘
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Core Layer                             │
//! │   Errors  •  Risk profile types  •  Domain rules            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use risk_profile_sync::{Application, ConfigLoader};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load().await?;
//!     let app = Application::build(config).await?;
//!     app.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// Core modules - Domain layer containing business entities and rules
pub mod core;

// Application layer - Lifecycle and health
pub mod application;

// Configuration management - Multi-source configuration loading
pub mod config;

// Infrastructure layer - External systems integration
pub mod infrastructure;

// Services layer - Business services and domain logic
pub mod services;

// Utilities - Retry policy, telemetry and CLI
pub mod utils;

// Re-export commonly used types for convenience
pub use application::Application;
pub use config::{AppConfig, ConfigLoader};
pub use crate::core::{AppError, AppResult, types::*};
pub use services::{PriceValidator, RiskProfileSyncService};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "risk-profile-sync");
        assert!(!DESCRIPTION.is_empty());
    }
}
