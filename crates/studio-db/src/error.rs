//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  Input::validate()          SQLite Error (sqlx::Error)                 │
//! │       │                            │                                    │
//! │       ▼                            ▼                                    │
//! │  ValidationErrors           DbError (this module)                      │
//! │       │                            │                                    │
//! │       └──────────► DbError ◄───────┘                                   │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │  API layer: 400 Validation, 404 NotFound, 409 Conflict, 500 rest       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use studio_core::{CoreError, ValidationError, ValidationErrors};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Input failed field validation, including duplicates and unknown
    /// references detected before the write.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Delete refused because protected rows still reference the entity.
    ///
    /// ## When This Occurs
    /// - Deleting a variant that appears on an order or consignment
    /// - Deleting a product whose variants do
    #[error("{entity} {id} is still referenced by {referenced_by}")]
    Conflict {
        entity: String,
        id: String,
        referenced_by: String,
    },

    /// No free SKU could be allocated.
    #[error("Could not allocate a unique SKU for '{base}' after {attempts} attempts")]
    AllocationExhausted { base: String, attempts: u32 },

    /// Unique constraint violation not attributable to a known field.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Conflict error for a protected delete.
    pub fn conflict(
        entity: impl Into<String>,
        id: impl Into<String>,
        referenced_by: impl Into<String>,
    ) -> Self {
        DbError::Conflict {
            entity: entity.into(),
            id: id.into(),
            referenced_by: referenced_by.into(),
        }
    }

    /// Creates a validation error reporting `value` as already taken.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::Validation(ValidationErrors::from(ValidationError::Duplicate {
            field: field.into(),
            value: value.into(),
        }))
    }

    /// The validation report, when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            DbError::Validation(report) => Some(report),
            _ => None,
        }
    }

    /// Whether a raw UNIQUE violation names `column` (e.g. `products.sku`).
    pub(crate) fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.contains(column))
    }
}

impl From<ValidationErrors> for DbError {
    fn from(report: ValidationErrors) -> Self {
        DbError::Validation(report)
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Validation(err.into())
    }
}

impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AllocationExhausted { base, attempts } => {
                DbError::AllocationExhausted { base, attempts }
            }
            CoreError::Validation(report) => DbError::Validation(report),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>[, <table>.<column>]"
                // "FOREIGN KEY constraint failed"
                if let Some(columns) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: columns.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
