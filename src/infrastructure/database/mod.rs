//! Database infrastructure
//!
//! Connection pooling, SQLSTATE classification and the retrying recovery
//! manager used by the direct-database profile store.

pub mod errors;
pub mod postgres;
pub mod recovery;

pub use errors::{classify_sqlstate, classify_sqlx_error, to_app_error, DbErrorCategory, DbErrorInfo};
pub use postgres::{PoolStatistics, PostgresPool, PostgresService};
pub use recovery::{DatabaseRecovery, RecoveryStats};
