//! Core domain layer containing business entities, value objects, and domain rules
//!
//! This module defines the fundamental building blocks shared by every other
//! layer: error types, result definitions, the risk-profile value objects and
//! the domain constants that govern reconciliation.
//!
//! # Design Principles
//!
//! 1. **Independence**: Core domain should not depend on external services
//! 2. **Immutability**: Value objects are immutable once validated
//! 3. **Type Safety**: Invalid profiles and wallets cannot be constructed

pub mod error;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use error::AppError;
pub use result::AppResult;
pub use types::*;

/// Domain constants and business rules
pub mod domain {
    use std::time::Duration;

    /// Reconciliation rules
    pub mod sync {
        use super::*;

        /// A frontend record younger than this wins reconciliation outright
        pub const FRONTEND_FRESHNESS: Duration = Duration::from_secs(3600);

        /// Minimum number of successful store writes for an update to count
        pub const WRITE_QUORUM: usize = 2;

        /// Retries of the full write sequence when sources still disagree
        pub const VERIFICATION_RETRIES: u32 = 3;

        /// Linear backoff step between verification retries
        pub const VERIFICATION_BACKOFF_STEP: Duration = Duration::from_millis(1000);

        /// Default period of the auto-reconciliation sweep
        pub const AUTO_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);
    }

    /// Timing rules for outbound calls
    pub mod performance {
        use super::*;

        /// Health check interval
        pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

        /// Connection timeout for external services
        pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

        /// Request timeout for bot-service calls
        pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    }
}

/// Domain validation rules and helpers
pub mod validation {
    use rust_decimal::Decimal;

    use super::error::AppError;

    /// Validate a Solana address format
    pub fn validate_solana_address(address: &str) -> Result<(), AppError> {
        if address.len() < 32 || address.len() > 44 {
            return Err(AppError::invalid_field(
                "wallet_address",
                address,
                format!("Invalid Solana address length: {}", address.len()),
            ));
        }

        // Basic base58 validation
        if !address.chars().all(|c| {
            matches!(c, '1'..='9' | 'A'..='H' | 'J'..='N' | 'P'..='Z' | 'a'..='k' | 'm'..='z')
        }) {
            return Err(AppError::invalid_field(
                "wallet_address",
                address,
                "Invalid base58 characters in address",
            ));
        }

        Ok(())
    }

    /// Validate an optional investment amount
    pub fn validate_investment_amount(amount: Option<Decimal>) -> Result<(), AppError> {
        match amount {
            Some(value) if value.is_sign_negative() && !value.is_zero() => Err(AppError::invalid_field(
                "investment_amount",
                value.to_string(),
                format!("Investment amount cannot be negative: {}", value),
            )),
            _ => Ok(()),
        }
    }
}
