//! Configuration management module
//!
//! Loading from multiple sources, typed models with defaults, and validation.

pub mod loader;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use loader::{load_config, load_config_from_path, load_config_with_args, ConfigLoader};
pub use models::AppConfig;
pub use validation::{ConfigValidator, ValidationResult};

// Re-export CLI args from utils for convenience
pub use crate::utils::CliArgs;
