//! Database error types.

use std::time::Duration;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors raised by a [`DataSource`](super::DataSource) or a
/// [`Connection`](super::Connection).
#[derive(Error, Debug)]
pub enum DbError {
    /// Opening a connection failed.
    #[error("database connection failed: {0}")]
    Connect(String),

    /// The database rejected or aborted a statement.
    #[error("query failed: {0}")]
    Query(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The statement ran longer than the configured query timeout.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the read.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A row sink refused a row.
    #[error("row processing failed: {0}")]
    Sink(String),

    /// A dialect requires a driver this source cannot provide.
    #[error("database driver not loaded: {0}")]
    DriverNotLoaded(String),
}

impl DbError {
    /// Check if this error is retriable.
    ///
    /// Connection trouble, timeouts and busy databases are; caller
    /// cancellation, sink failures and missing drivers are not.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Query(_) | Self::Timeout(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
            ),
            _ => false,
        }
    }

    /// Check if this error stems from the caller giving up.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}
