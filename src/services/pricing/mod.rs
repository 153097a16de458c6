//! Price quote validation
//!
//! Screens incoming token prices for staleness, outliers, volatility and
//! thin volume, and trips a per-token circuit breaker on repeated
//! rejections.

pub mod circuit_breaker;
pub mod validator;

pub use circuit_breaker::CircuitBreaker;
pub use validator::PriceValidator;

use serde::{Deserialize, Serialize};

use crate::core::types::Timestamp;

/// A price observation for one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Token mint or symbol
    pub token: String,
    /// Price in USD
    pub price: f64,
    /// When the price was observed
    pub timestamp: Timestamp,
    /// 24h traded volume in USD
    pub volume_24h: Option<f64>,
    /// Where the price came from
    pub source: String,
}

/// Verdict on a [`PriceQuote`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceValidation {
    /// No errors and enough confidence
    pub is_valid: bool,
    /// 0.0 to 1.0
    pub confidence: f64,
    /// Soft findings that lowered confidence
    pub warnings: Vec<String>,
    /// Hard findings that reject the quote
    pub errors: Vec<String>,
}
