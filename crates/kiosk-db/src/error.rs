//! # Database Error Types
//!
//! ```text
//! sqlx::Error
//!     │
//!     ├── Database("UNIQUE constraint failed: orders.gateway_order_id")
//!     │        └──► UniqueViolation { field: "orders.gateway_order_id" }
//!     ├── Database("FOREIGN KEY constraint failed") ──► ForeignKeyViolation
//!     ├── Database("CHECK constraint failed: ...")  ──► CheckViolation
//!     ├── Database(code 5 / 517, "database is locked") ──► Busy
//!     ├── PoolTimedOut ──► PoolExhausted
//!     └── anything else ──► Internal
//! ```
//!
//! Callers that can name the offending value (the gateway order id, the
//! activation code) re-wrap `UniqueViolation` with [`DbError::duplicate`].

use thiserror::Error;

/// SQLite primary result code for `SQLITE_BUSY`.
const SQLITE_BUSY: &str = "5";
/// Extended code `SQLITE_BUSY_SNAPSHOT`.
const SQLITE_BUSY_SNAPSHOT: &str = "517";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// `field` is SQLite's `table.column`.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Raised by `CHECK (quantity >= 0)` if a decrement ever slipped its guard.
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// Another writer held the lock past `busy_timeout`.
    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored JSON column could not be (de)serialized.
    #[error("Corrupt {entity} data: {message}")]
    Corrupt { entity: String, message: String },

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True when this is a UNIQUE violation on `table.column`.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field == column)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::PoolExhausted)
    }

    /// Sorts a SQLite error message into a constraint category.
    fn from_sqlite_message(message: &str) -> Self {
        if let Some(field) = message.strip_prefix("UNIQUE constraint failed: ") {
            // Composite keys list every column; the first names the table.
            let field = field.split(',').next().unwrap_or(field).trim();
            return DbError::duplicate(field, "unknown");
        }
        if message.starts_with("FOREIGN KEY constraint failed") {
            return DbError::ForeignKeyViolation {
                message: message.to_string(),
            };
        }
        if message.starts_with("CHECK constraint failed") {
            return DbError::CheckViolation {
                message: message.to_string(),
            };
        }
        DbError::QueryFailed(message.to_string())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code();
                if matches!(code.as_deref(), Some(SQLITE_BUSY) | Some(SQLITE_BUSY_SNAPSHOT)) {
                    DbError::Busy(db_err.message().to_string())
                } else {
                    DbError::from_sqlite_message(db_err.message())
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_matching() {
        let err = DbError::duplicate("orders.gateway_order_id", "mp-1");
        assert!(err.is_unique_violation_on("orders.gateway_order_id"));
        assert!(!err.is_unique_violation_on("devices.device_identifier"));
        assert!(!DbError::PoolExhausted.is_unique_violation_on("orders.gateway_order_id"));
    }

    #[test]
    fn test_sqlite_message_classification() {
        assert!(DbError::from_sqlite_message("UNIQUE constraint failed: devices.device_identifier")
            .is_unique_violation_on("devices.device_identifier"));
        assert!(matches!(
            DbError::from_sqlite_message("FOREIGN KEY constraint failed"),
            DbError::ForeignKeyViolation { .. }
        ));
        assert!(matches!(
            DbError::from_sqlite_message("CHECK constraint failed: quantity >= 0"),
            DbError::CheckViolation { .. }
        ));
        assert!(matches!(
            DbError::from_sqlite_message("no such table: nope"),
            DbError::QueryFailed(_)
        ));
    }

    #[test]
    fn test_busy_detection() {
        assert!(DbError::Busy("database is locked".into()).is_busy());
        assert!(DbError::PoolExhausted.is_busy());
        assert!(!DbError::not_found("Order", "mp-1").is_busy());
    }
}
