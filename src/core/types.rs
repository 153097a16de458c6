//! Core type definitions and value objects for the domain model
//!
//! Strongly-typed wrappers around the primitive values that flow between the
//! settings stores, the bot service and the reconciliation logic.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::AppError;

/// UTC timestamp used across the domain
pub type Timestamp = DateTime<Utc>;

/// Solana wallet address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Create a new wallet address with validation
    pub fn new(address: impl Into<String>) -> Result<Self, AppError> {
        let address = address.into();
        crate::core::validation::validate_solana_address(&address)?;
        Ok(Self(address))
    }

    /// Get the address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines
    pub fn short(&self) -> String {
        format!("{}...", &self.0[..8.min(self.0.len())])
    }

    /// Get the inner string value
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WalletAddress {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WalletAddress> for String {
    fn from(address: WalletAddress) -> Self {
        address.0
    }
}

/// A user's risk appetite, as shared by every store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskProfile {
    /// Only the most trusted traders are replicated
    Conservative,
    /// Default profile; the bot service calls it `moderate`
    Balanced,
    /// Widest trader selection, largest sizing
    Aggressive,
}

impl RiskProfile {
    /// All canonical values, in ascending order of risk
    pub const ALL: [RiskProfile; 3] = [Self::Conservative, Self::Balanced, Self::Aggressive];

    /// Normalize a free-form profile name.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// `moderate` and `balanced` both map to [`RiskProfile::Balanced`].
    /// Unknown names are rejected rather than defaulted.
    pub fn normalize(input: &str) -> Result<Self, AppError> {
        match input.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "balanced" | "moderate" => Ok(Self::Balanced),
            "aggressive" => Ok(Self::Aggressive),
            _ => Err(AppError::invalid_field(
                "risk_profile",
                input,
                format!("Unknown risk profile '{}'", input),
            )),
        }
    }

    /// Settings-table representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "Conservative",
            Self::Balanced => "Balanced",
            Self::Aggressive => "Aggressive",
        }
    }

    /// Representation expected by the bot microservice
    pub fn as_bot_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "moderate",
            Self::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskProfile {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

/// One of the three independent stores holding a wallet's risk profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    /// User-settings service used by the web frontend
    Frontend,
    /// Configuration endpoint of the bot microservice
    BotService,
    /// Direct database proxy over the settings table
    Database,
}

impl ProfileSource {
    /// Tie-break order used when picking a canonical record
    pub const PRIORITY: [ProfileSource; 3] = [Self::Frontend, Self::Database, Self::BotService];

    /// Stable name used in logs, errors and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::BotService => "bot_service",
            Self::Database => "database",
        }
    }
}

impl fmt::Display for ProfileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest risk-profile value held by one source for one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfileRecord {
    /// Normalized profile
    pub risk_profile: RiskProfile,
    /// Amount the user is willing to commit, in SOL
    pub investment_amount: Option<Decimal>,
    /// When the source last changed this value
    pub last_updated: Timestamp,
    /// Store the record was read from
    pub source: ProfileSource,
}

impl RiskProfileRecord {
    /// Create a record
    pub fn new(
        risk_profile: RiskProfile,
        investment_amount: Option<Decimal>,
        last_updated: Timestamp,
        source: ProfileSource,
    ) -> Self {
        Self {
            risk_profile,
            investment_amount,
            last_updated,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_known_values() {
        assert_eq!(RiskProfile::normalize("Conservative").unwrap(), RiskProfile::Conservative);
        assert_eq!(RiskProfile::normalize("  AGGRESSIVE ").unwrap(), RiskProfile::Aggressive);
        assert_eq!(RiskProfile::normalize("moderate").unwrap(), RiskProfile::Balanced);
        assert_eq!(RiskProfile::normalize("Moderate").unwrap(), RiskProfile::Balanced);
        assert_eq!(RiskProfile::normalize("BALANCED").unwrap(), RiskProfile::Balanced);
    }

    #[test]
    fn test_normalize_rejects_unknown() {
        let err = RiskProfile::normalize("yolo").unwrap_err();
        match err {
            AppError::Validation { field, value, .. } => {
                assert_eq!(field.as_deref(), Some("risk_profile"));
                assert_eq!(value.as_deref(), Some("yolo"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(RiskProfile::normalize("").is_err());
    }

    #[test]
    fn test_round_trip_through_both_forms() {
        for profile in RiskProfile::ALL {
            assert_eq!(RiskProfile::normalize(profile.as_bot_str()).unwrap(), profile);
            assert_eq!(RiskProfile::normalize(profile.as_str()).unwrap(), profile);
        }
    }

    #[test]
    fn test_source_priority_order() {
        assert_eq!(
            ProfileSource::PRIORITY,
            [ProfileSource::Frontend, ProfileSource::Database, ProfileSource::BotService]
        );
        assert_eq!(ProfileSource::BotService.to_string(), "bot_service");
    }

    #[test]
    fn test_wallet_address_validation() {
        assert!(WalletAddress::new("11111111111111111111111111111112").is_ok());
        assert!(WalletAddress::new("").is_err());
        assert!(WalletAddress::new("not-a-wallet").is_err());
    }

    #[test]
    fn test_wallet_address_deserialization_is_validated() {
        let wallet: WalletAddress = serde_json::from_str("\"11111111111111111111111111111112\"").unwrap();
        assert_eq!(wallet.as_str(), "11111111111111111111111111111112");
        assert_eq!(serde_json::to_string(&wallet).unwrap(), "\"11111111111111111111111111111112\"");

        assert!(serde_json::from_str::<WalletAddress>("\"not-a-wallet\"").is_err());
        assert!(serde_json::from_str::<WalletAddress>("\"\"").is_err());
    }

    proptest! {
        #[test]
        fn normalize_never_yields_outside_enum(input in "\\PC{0,24}") {
            if let Ok(profile) = RiskProfile::normalize(&input) {
                prop_assert!(RiskProfile::ALL.contains(&profile));
            }
        }

        #[test]
        fn normalize_is_case_insensitive(idx in 0usize..4, upper in proptest::collection::vec(any::<bool>(), 12)) {
            let names = ["conservative", "balanced", "moderate", "aggressive"];
            let mixed: String = names[idx]
                .chars()
                .zip(upper.iter().cycle())
                .map(|(c, up)| if *up { c.to_ascii_uppercase() } else { c })
                .collect();
            prop_assert_eq!(
                RiskProfile::normalize(&mixed).unwrap(),
                RiskProfile::normalize(names[idx]).unwrap()
            );
        }
    }
}
