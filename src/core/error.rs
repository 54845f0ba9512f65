//! Error types for the data-access layer
//!
//! This module defines all error types that can occur while building, executing
//! and mapping database operations.

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error types for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Connection error (pool creation, acquisition, health check)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Connection timeout
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },

    /// Query execution error
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Query timeout
    #[error("Query timeout after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// Type conversion error
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A database string did not match any declared enum member
    #[error("Unknown enum value '{value}' for enum {enum_name}")]
    UnknownEnumValue { enum_name: String, value: String },

    /// A non-nullable field had no matching column (or the column was NULL)
    #[error("Missing required field {type_name}.{field} (column '{column}')")]
    MissingField {
        type_name: String,
        field: String,
        column: String,
    },

    /// Column not found
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// A type name was looked up in a registry that does not know it
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// A transaction step referenced a step that is not strictly earlier
    #[error("Step {step} references step {referenced}, which is not an earlier step")]
    InvalidStepReference { step: usize, referenced: usize },

    /// A step reference could not be resolved against the recorded results
    #[error("Step {step} could not resolve column '{column}' of step {referenced}")]
    UnresolvedReference {
        step: usize,
        referenced: usize,
        column: String,
    },

    /// A transaction step failed; the whole transaction was rolled back
    #[error("Transaction step {step} failed: {source}")]
    StepFailed {
        step: usize,
        #[source]
        source: Box<DatabaseError>,
    },

    /// Transaction error
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Create a new connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::ConnectionError(msg.into())
    }

    /// Create a connection timeout error
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        DatabaseError::ConnectionTimeout { timeout_ms }
    }

    /// Create a new query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        DatabaseError::QueryError(msg.into())
    }

    /// Create a query timeout error
    pub fn query_timeout(timeout_ms: u64) -> Self {
        DatabaseError::QueryTimeout { timeout_ms }
    }

    /// Create a new type mismatch error
    pub fn type_mismatch(expected: &str, actual: &str) -> Self {
        DatabaseError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an unknown enum value error
    pub fn unknown_enum_value(enum_name: &str, value: &str) -> Self {
        DatabaseError::UnknownEnumValue {
            enum_name: enum_name.to_string(),
            value: value.to_string(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(type_name: &str, field: &str, column: &str) -> Self {
        DatabaseError::MissingField {
            type_name: type_name.to_string(),
            field: field.to_string(),
            column: column.to_string(),
        }
    }

    /// Wrap an error raised while executing a transaction step
    pub fn step_failed(step: usize, source: DatabaseError) -> Self {
        DatabaseError::StepFailed {
            step,
            source: Box::new(source),
        }
    }

    /// Create a new transaction error
    pub fn transaction<S: Into<String>>(msg: S) -> Self {
        DatabaseError::TransactionError(msg.into())
    }

    /// Create a new migration error
    pub fn migration<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Migration(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Other(msg.into())
    }

    /// The innermost error, looking through `StepFailed` wrappers
    pub fn root_cause(&self) -> &DatabaseError {
        match self {
            DatabaseError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the statement broke a UNIQUE, CHECK, NOT NULL or foreign key constraint
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self.root_cause(),
            DatabaseError::SqliteError(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = DatabaseError::connection("Failed to connect");
        assert!(matches!(err, DatabaseError::ConnectionError(_)));

        let err = DatabaseError::query("Invalid SQL");
        assert!(matches!(err, DatabaseError::QueryError(_)));

        let err = DatabaseError::type_mismatch("i32", "String");
        assert!(matches!(err, DatabaseError::TypeMismatch { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = DatabaseError::connection("Connection refused");
        assert_eq!(err.to_string(), "Connection error: Connection refused");

        let err = DatabaseError::type_mismatch("i64", "f64");
        assert_eq!(err.to_string(), "Type mismatch: expected i64, got f64");

        let err = DatabaseError::unknown_enum_value("publication_type", "COMIC_STRIP");
        assert_eq!(
            err.to_string(),
            "Unknown enum value 'COMIC_STRIP' for enum publication_type"
        );

        let err = DatabaseError::InvalidStepReference {
            step: 1,
            referenced: 3,
        };
        assert_eq!(
            err.to_string(),
            "Step 1 references step 3, which is not an earlier step"
        );
    }

    #[test]
    fn test_root_cause_unwraps_step_failures() {
        let err = DatabaseError::step_failed(2, DatabaseError::query("constraint failed"));
        assert!(matches!(err.root_cause(), DatabaseError::QueryError(_)));
        assert!(err.to_string().starts_with("Transaction step 2 failed"));
    }
}
