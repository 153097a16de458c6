//! Result type definition for the application
//!
//! This module provides the result type alias used throughout the crate.

use crate::core::error::AppError;

/// Application result type alias
///
/// This is the primary result type used throughout the crate.
///
/// # Examples
///
/// ```rust
/// use risk_profile_sync::core::result::AppResult;
/// use risk_profile_sync::core::error::AppError;
///
/// fn example_function() -> AppResult<String> {
///     Ok("Success".to_string())
/// }
///
/// fn failing_function() -> AppResult<()> {
///     Err(AppError::validation("Invalid input"))
/// }
/// ```
pub type AppResult<T> = std::result::Result<T, AppError>;
