//! Application error types and error handling utilities
//!
//! This module defines the error system shared by the reconciliation service,
//! the store adapters, the bot client and the database recovery manager.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main application error type that encompasses all possible errors
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config {
        /// Human readable message
        message: String,
    },

    /// Database operation errors
    #[error("Database error: {message}")]
    Database {
        /// Human readable message
        message: String,
        /// Logical operation that failed (e.g. `fetch_profile`)
        operation: String,
        /// Postgres SQLSTATE, when the server reported one
        sqlstate: Option<String>,
        /// Whether the recovery manager considered the failure transient
        retryable: bool,
    },

    /// Network and HTTP communication errors
    #[error("Network error: {message}")]
    Network {
        /// Human readable message
        message: String,
        /// Endpoint that was being called
        endpoint: Option<String>,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation {
        /// Human readable message
        message: String,
        /// Offending field
        field: Option<String>,
        /// Offending value
        value: Option<String>,
    },

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal {
        /// Human readable message
        message: String,
    },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout {
        /// Human readable message
        message: String,
        /// Operation that timed out
        operation: String,
    },

    /// External service errors
    #[error("External service error: {service} - {message}")]
    ExternalService {
        /// Service name
        service: String,
        /// Human readable message
        message: String,
        /// HTTP status returned by the service
        status_code: Option<u16>,
    },
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new database error
    pub fn database<S: Into<String>, O: Into<String>>(message: S, operation: O) -> Self {
        Self::Database {
            message: message.into(),
            operation: operation.into(),
            sqlstate: None,
            retryable: false,
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            endpoint: None,
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
            value: None,
        }
    }

    /// Create a validation error tied to a field and value
    pub fn invalid_field<F: Into<String>, V: Into<String>, S: Into<String>>(
        field: F,
        value: V,
        message: S,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
            value: Some(value.into()),
        }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a new external service error
    pub fn external<S: Into<String>, M: Into<String>>(
        service: S,
        message: M,
        status_code: Option<u16>,
    ) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Database { retryable, .. } => *retryable,
            // 4xx from the bot service will not fix itself
            Self::ExternalService { status_code, .. } => {
                !matches!(status_code, Some(code) if (400..500).contains(code) && *code != 429)
            }
            _ => false,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(format!("JSON serialization error: {}", err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::config(format!("Configuration source error: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("IO error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                message: format!("HTTP request timed out: {}", err),
                operation: "http_request".to_string(),
            };
        }
        Self::Network {
            message: format!("HTTP request error: {}", err),
            endpoint: err.url().map(|u| u.to_string()),
        }
    }
}
