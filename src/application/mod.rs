//! Application layer module
//!
//! This module contains the main application structure and the health
//! service. It wires stores and services together and runs the reconciliation
//! lifecycle.

pub mod app;
pub mod health;

// Re-export main application type
pub use app::{Application, ApplicationState};
pub use health::{HealthService, HealthStatus, ComponentHealth};
