//! Error types for the storage layer
//!
//! Every failure that crosses a [`Transaction`](crate::core::Transaction) boundary is wrapped in
//! [`DatabaseError::TransactionFailed`], and every fatal schema patch failure in
//! [`DatabaseError::PatchFailed`], so callers can tell which unit of work failed and why.

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Error types for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Connection error (generic)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Connection timeout
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },

    /// Every pooled connection stayed checked out for the whole acquire timeout
    #[error("Connection pool exhausted: {active}/{max} connections in use")]
    PoolExhausted { active: usize, max: usize },

    /// Query execution error
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Query timeout
    #[error("Query timeout after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// Type conversion error
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A transaction failed and everything it wrote was rolled back
    #[error("Transaction '{transaction}' failed: {source}")]
    TransactionFailed {
        transaction: String,
        #[source]
        source: Box<DatabaseError>,
    },

    /// A schema patch failed to apply; startup must not continue
    #[error("Patch '{patch}' failed to apply: {source}")]
    PatchFailed {
        patch: String,
        #[source]
        source: Box<DatabaseError>,
    },

    /// An invariant the storage code relies on does not hold
    #[error("Operation error: {0}")]
    Operation(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unsupported operation for the active dialect
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// MySQL error
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    MysqlError(#[from] mysql_async::Error),
}

impl DatabaseError {
    /// Create a new connection error (generic)
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::ConnectionError(msg.into())
    }

    /// Create a connection timeout error
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        DatabaseError::ConnectionTimeout { timeout_ms }
    }

    /// Create a pool exhausted error
    pub fn pool_exhausted(active: usize, max: usize) -> Self {
        DatabaseError::PoolExhausted { active, max }
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

    /// Wrap an error raised inside a transaction
    pub fn transaction_failed(transaction: impl Into<String>, source: DatabaseError) -> Self {
        DatabaseError::TransactionFailed {
            transaction: transaction.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an error raised while a patch was being applied
    pub fn patch_failed(patch: impl Into<String>, source: DatabaseError) -> Self {
        DatabaseError::PatchFailed {
            patch: patch.into(),
            source: Box::new(source),
        }
    }

    /// Create a logic error
    pub fn operation<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Operation(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Config(msg.into())
    }

    /// Create a new unsupported operation error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        DatabaseError::UnsupportedOperation(msg.into())
    }

    /// The innermost error, looking through transaction and patch wrappers
    pub fn root_cause(&self) -> &DatabaseError {
        match self {
            DatabaseError::TransactionFailed { source, .. }
            | DatabaseError::PatchFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the failure was caused by lock contention and the work can be retried
    ///
    /// MySQL reports deadlocks as 1213 and lock wait timeouts as 1205; SQLite reports
    /// `SQLITE_BUSY` or `SQLITE_LOCKED`.
    pub fn is_deadlock(&self) -> bool {
        match self.root_cause() {
            #[cfg(feature = "sqlite")]
            DatabaseError::SqliteError(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            #[cfg(feature = "mysql")]
            DatabaseError::MysqlError(mysql_async::Error::Server(e)) => {
                e.code == 1213 || e.code == 1205
            }
            _ => false,
        }
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
    }

    #[test]
    fn test_wrapped_errors_name_the_unit_of_work() {
        let err = DatabaseError::patch_failed(
            "KillsOptimizationPatch",
            DatabaseError::query("no such table: plan_kills_temp"),
        );
        assert_eq!(
            err.to_string(),
            "Patch 'KillsOptimizationPatch' failed to apply: \
             Query execution error: no such table: plan_kills_temp"
        );

        let err = DatabaseError::transaction_failed("StoreProvider", err);
        assert!(matches!(err.root_cause(), DatabaseError::QueryError(_)));
    }

    #[test]
    fn test_plain_errors_are_not_deadlocks() {
        assert!(!DatabaseError::operation("missing provider").is_deadlock());
        assert!(!DatabaseError::transaction_failed("Tx", DatabaseError::query("x")).is_deadlock());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_busy_is_deadlock() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        let err = DatabaseError::transaction_failed("Tx", DatabaseError::from(busy));
        assert!(err.is_deadlock());
    }
}
