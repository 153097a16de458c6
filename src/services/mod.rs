//! Services layer module
//!
//! This module contains the risk profile reconciliation service, the bot
//! microservice client and price validation.

pub mod bot_service;
pub mod pricing;
pub mod sync;

// Re-export commonly used types
pub use bot_service::BotServiceClient;
pub use pricing::{CircuitBreaker, PriceQuote, PriceValidation, PriceValidator};
pub use sync::{
    AutoReconciler, Convergence, ProfileStore, ReconcilerHandle, RiskProfileSyncService,
    SweepReport, SyncResult, SyncSettings, SyncStatus,
};
