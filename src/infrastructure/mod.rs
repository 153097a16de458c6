//! Infrastructure layer module
//!
//! This module contains the database connectivity, error classification,
//! recovery and monitoring services.

pub mod database;
pub mod monitoring;

// Re-export commonly used types
pub use database::{DatabaseRecovery, PostgresPool, PostgresService};
