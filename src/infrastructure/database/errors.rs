//! PostgreSQL error classification
//!
//! Maps SQLSTATE codes and driver-level `sqlx` failures onto a small set of
//! categories, each tagged with whether a retry can help and whether the
//! failure points at the database itself being unusable.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::core::error::AppError;

/// Broad failure category of a database error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbErrorCategory {
    /// Server unreachable, connection dropped or refused
    Connection,
    /// Serialization failure or deadlock
    Transaction,
    /// Lock could not be acquired
    Lock,
    /// Statement canceled or server shutting down
    Cancelled,
    /// Unique, foreign key, not-null or check violation
    Constraint,
    /// Invalid input data (bad cast, overflow, malformed text)
    Data,
    /// Undefined table/column or syntax error
    Schema,
    /// Authentication or authorization failure
    Authentication,
    /// Out of disk, memory or connections
    Resource,
    /// Server-side internal error
    Internal,
    /// Query expected a row and got none
    NotFound,
    /// Anything not covered above
    Unknown,
}

impl DbErrorCategory {
    /// Stable name used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Transaction => "transaction",
            Self::Lock => "lock",
            Self::Cancelled => "cancelled",
            Self::Constraint => "constraint",
            Self::Data => "data",
            Self::Schema => "schema",
            Self::Authentication => "authentication",
            Self::Resource => "resource",
            Self::Internal => "internal",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DbErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one database failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbErrorInfo {
    /// Failure category
    pub category: DbErrorCategory,
    /// A retry of the same statement may succeed
    pub retryable: bool,
    /// The database is unusable until someone intervenes
    pub critical: bool,
    /// SQLSTATE reported by the server, if any
    pub sqlstate: Option<String>,
}

impl DbErrorInfo {
    fn new(category: DbErrorCategory, retryable: bool, critical: bool, sqlstate: Option<String>) -> Self {
        Self {
            category,
            retryable,
            critical,
            sqlstate,
        }
    }
}

/// (category, retryable, critical) per exact SQLSTATE
static SQLSTATE_TABLE: Lazy<HashMap<&'static str, (DbErrorCategory, bool, bool)>> = Lazy::new(|| {
    use DbErrorCategory::*;

    HashMap::from([
        // connection exceptions
        ("08000", (Connection, true, true)),
        ("08001", (Connection, true, true)),
        ("08003", (Connection, true, true)),
        ("08004", (Connection, true, true)),
        ("08006", (Connection, true, true)),
        ("08007", (Connection, true, false)),
        ("08P01", (Connection, true, false)),
        // operator intervention
        ("57P01", (Cancelled, true, true)),
        ("57P02", (Cancelled, true, true)),
        ("57P03", (Connection, true, true)),
        ("57014", (Cancelled, true, false)),
        // insufficient resources
        ("53000", (Resource, false, true)),
        ("53100", (Resource, false, true)),
        ("53200", (Resource, false, true)),
        ("53300", (Resource, true, true)),
        // transaction rollback
        ("40000", (Transaction, true, false)),
        ("40001", (Transaction, true, false)),
        ("40P01", (Transaction, true, false)),
        ("55P03", (Lock, true, false)),
        // integrity constraint violations
        ("23000", (Constraint, false, false)),
        ("23502", (Constraint, false, false)),
        ("23503", (Constraint, false, false)),
        ("23505", (Constraint, false, false)),
        ("23514", (Constraint, false, false)),
        // data exceptions
        ("22001", (Data, false, false)),
        ("22003", (Data, false, false)),
        ("22007", (Data, false, false)),
        ("22P02", (Data, false, false)),
        // syntax / schema
        ("42601", (Schema, false, true)),
        ("42703", (Schema, false, true)),
        ("42P01", (Schema, false, true)),
        ("42501", (Authentication, false, true)),
        // authentication
        ("28000", (Authentication, false, true)),
        ("28P01", (Authentication, false, true)),
        // internal
        ("XX000", (Internal, false, true)),
        ("XX001", (Internal, false, true)),
        ("XX002", (Internal, false, true)),
    ])
});

/// Classify a SQLSTATE code.
///
/// Exact matches come from a static table; otherwise the two-character class
/// decides. Unknown classes are neither retryable nor critical.
pub fn classify_sqlstate(code: &str) -> DbErrorInfo {
    let code = code.trim().to_ascii_uppercase();

    if let Some(&(category, retryable, critical)) = SQLSTATE_TABLE.get(code.as_str()) {
        return DbErrorInfo::new(category, retryable, critical, Some(code));
    }

    let (category, retryable, critical) = match code.get(..2).unwrap_or_default() {
        "08" => (DbErrorCategory::Connection, true, true),
        "40" => (DbErrorCategory::Transaction, true, false),
        "57" => (DbErrorCategory::Cancelled, true, true),
        "55" => (DbErrorCategory::Lock, false, false),
        "53" => (DbErrorCategory::Resource, false, true),
        "23" => (DbErrorCategory::Constraint, false, false),
        "22" => (DbErrorCategory::Data, false, false),
        "42" => (DbErrorCategory::Schema, false, true),
        "28" => (DbErrorCategory::Authentication, false, true),
        "XX" => (DbErrorCategory::Internal, false, true),
        _ => (DbErrorCategory::Unknown, false, false),
    };

    DbErrorInfo::new(category, retryable, critical, Some(code))
}

fn is_transient_message(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("connection reset")
        || lowered.contains("connection refused")
        || lowered.contains("broken pipe")
        || lowered.contains("timed out")
}

/// Classify a driver error, consulting the SQLSTATE when the server sent one
pub fn classify_sqlx_error(error: &sqlx::Error) -> DbErrorInfo {
    match error {
        sqlx::Error::Database(db_error) => match db_error.code() {
            Some(code) => classify_sqlstate(&code),
            None if is_transient_message(db_error.message()) => {
                DbErrorInfo::new(DbErrorCategory::Connection, true, false, None)
            }
            None => DbErrorInfo::new(DbErrorCategory::Unknown, false, false, None),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            DbErrorInfo::new(DbErrorCategory::Connection, true, false, None)
        }
        sqlx::Error::PoolClosed => DbErrorInfo::new(DbErrorCategory::Connection, false, true, None),
        sqlx::Error::Tls(_) => DbErrorInfo::new(DbErrorCategory::Connection, false, true, None),
        sqlx::Error::RowNotFound => DbErrorInfo::new(DbErrorCategory::NotFound, false, false, None),
        sqlx::Error::ColumnNotFound(_) => DbErrorInfo::new(DbErrorCategory::Schema, false, true, None),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            DbErrorInfo::new(DbErrorCategory::Data, false, false, None)
        }
        other if is_transient_message(&other.to_string()) => {
            DbErrorInfo::new(DbErrorCategory::Connection, true, false, None)
        }
        _ => DbErrorInfo::new(DbErrorCategory::Unknown, false, false, None),
    }
}

/// Convert a driver error into an `AppError::Database` carrying its classification
pub fn to_app_error(error: &sqlx::Error, operation: &str) -> AppError {
    let info = classify_sqlx_error(error);
    AppError::Database {
        message: format!("{} ({}): {}", operation, info.category, error),
        operation: operation.to_string(),
        sqlstate: info.sqlstate,
        retryable: info.retryable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_retryable_codes() {
        for code in ["40001", "40P01", "55P03", "57014", "08006", "57P01", "53300"] {
            assert!(classify_sqlstate(code).retryable, "{} should be retryable", code);
        }
    }

    #[test]
    fn test_permanent_codes() {
        for code in ["23505", "23503", "22P02", "42P01", "28P01", "53100", "XX000"] {
            assert!(!classify_sqlstate(code).retryable, "{} should not be retryable", code);
        }
    }

    #[test]
    fn test_criticality() {
        assert!(classify_sqlstate("08006").critical);
        assert!(classify_sqlstate("53300").critical);
        assert!(classify_sqlstate("28P01").critical);
        assert!(!classify_sqlstate("40P01").critical);
        assert!(!classify_sqlstate("23505").critical);
    }

    #[test]
    fn test_class_fallback() {
        let info = classify_sqlstate("08XYZ");
        assert_eq!(info.category, DbErrorCategory::Connection);
        assert!(info.retryable);
        assert_eq!(info.sqlstate.as_deref(), Some("08XYZ"));

        let info = classify_sqlstate("23999");
        assert_eq!(info.category, DbErrorCategory::Constraint);

        let info = classify_sqlstate("ZZ000");
        assert_eq!(info.category, DbErrorCategory::Unknown);
        assert!(!info.retryable);
        assert!(!info.critical);
    }

    #[test]
    fn test_lowercase_codes_are_normalized() {
        assert_eq!(classify_sqlstate("40p01").category, DbErrorCategory::Transaction);
    }

    #[test]
    fn test_driver_errors() {
        let timeout = classify_sqlx_error(&sqlx::Error::PoolTimedOut);
        assert_eq!(timeout.category, DbErrorCategory::Connection);
        assert!(timeout.retryable);

        let closed = classify_sqlx_error(&sqlx::Error::PoolClosed);
        assert!(!closed.retryable);
        assert!(closed.critical);

        let missing = classify_sqlx_error(&sqlx::Error::RowNotFound);
        assert_eq!(missing.category, DbErrorCategory::NotFound);
        assert!(!missing.retryable);

        let io = sqlx::Error::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"));
        assert!(classify_sqlx_error(&io).retryable);
    }

    #[test]
    fn test_to_app_error_carries_retryability() {
        let error = to_app_error(&sqlx::Error::PoolTimedOut, "fetch_profile");
        assert!(error.is_retryable());
        match error {
            AppError::Database { operation, sqlstate, .. } => {
                assert_eq!(operation, "fetch_profile");
                assert!(sqlstate.is_none());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
