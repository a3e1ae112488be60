//! Error types for the data-access layer.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Driver failures are wrapped according to the operation that produced them, so a
//! caller can tell a failed read from a failed write from a broken transaction.

use std::fmt;
use thiserror::Error;

/// Stage of an explicit transaction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStage {
    Begin,
    Commit,
    Rollback,
}

impl fmt::Display for TransactionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::Commit => write!(f, "commit"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error(
        "Binding error: statement has {placeholders} placeholder(s) but {args} argument(s) were supplied"
    )]
    Binding { placeholders: usize, args: usize },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        /// e.g., "42S02" for unknown table
        sql_state: Option<String>,
    },

    #[error("Mutation failed: {message}")]
    Mutation {
        message: String,
        sql_state: Option<String>,
    },

    /// The connection that produced this error is in an unknown state.
    #[error("Transaction {stage} failed: {message}{}", original_suffix(.original))]
    Transaction {
        stage: TransactionStage,
        message: String,
        /// The execution failure that triggered a rollback, when the rollback itself failed.
        original: Option<Box<DbError>>,
    },

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn original_suffix(original: &Option<Box<DbError>>) -> String {
    match original {
        Some(err) => format!(" (original error: {})", err),
        None => String::new(),
    }
}

impl DbError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a binding error for a placeholder/argument count mismatch.
    pub fn binding(placeholders: usize, args: usize) -> Self {
        Self::Binding { placeholders, args }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wrap a driver failure raised while running a read statement.
    pub fn query(err: sqlx::Error) -> Self {
        classify(err, |message, sql_state| Self::Query { message, sql_state })
    }

    /// Wrap a driver failure raised while running a write statement.
    pub fn mutation(err: sqlx::Error) -> Self {
        classify(err, |message, sql_state| Self::Mutation { message, sql_state })
    }

    /// Wrap a failure of BEGIN, COMMIT or ROLLBACK itself.
    pub fn transaction(
        stage: TransactionStage,
        err: sqlx::Error,
        original: Option<DbError>,
    ) -> Self {
        Self::Transaction {
            stage,
            message: err.to_string(),
            original: original.map(Box::new),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Binding { .. } => Some("Supply exactly one argument per '?' placeholder"),
            Self::PoolClosed => Some("The server is shutting down"),
            Self::Transaction { .. } => Some("The connection was discarded; retry the operation"),
            _ => None,
        }
    }

    /// Check if this error is retryable. Retrying is always left to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::Transaction { .. }
        )
    }

    /// Whether the connection that produced this error must be dropped from the pool.
    pub fn requires_discard(&self) -> bool {
        matches!(self, Self::Transaction { .. })
    }

    /// The original execution failure carried by a failed rollback.
    pub fn original(&self) -> Option<&DbError> {
        match self {
            Self::Transaction {
                original: Some(err),
                ..
            } => Some(err),
            _ => None,
        }
    }
}

/// Map pool errors to their own variants and hand everything raised while a
/// statement runs to `wrap`, including I/O lost mid-statement.
fn classify(err: sqlx::Error, wrap: impl FnOnce(String, Option<String>) -> DbError) -> DbError {
    match err {
        sqlx::Error::PoolClosed => DbError::PoolClosed,
        sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire", 0),
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string());
            wrap(db_err.message().to_string(), code)
        }
        other => wrap(other.to_string(), None),
    }
}

/// Convert sqlx errors raised outside statement execution (connect, close).
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::configuration(msg.to_string()),
            sqlx::Error::PoolClosed => DbError::PoolClosed,
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire", 0),
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::Database(db_err) => DbError::connection(
                db_err.message().to_string(),
                "Verify the user, password and database name",
            ),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
