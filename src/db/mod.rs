//! Database access.
//!
//! [`DataSource`] hands out [`Connection`]s; statements stream their rows
//! into a [`RowSink`]. [`RetryableExecutor`] layers connection handling,
//! retries and cancellation on top.
//!
//! # Example
//!
//! ```ignore
//! use strata::db::{DataSource, SqliteDataSource, CollectingSink, QueryOptions, Cancellation};
//!
//! async fn example(source: &SqliteDataSource) -> strata::db::DbResult<()> {
//!     let mut conn = source.connect(true).await?;
//!     let mut sink = CollectingSink::default();
//!     conn.query("SELECT 1", &QueryOptions::default(), &mut sink, &Cancellation::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod executor;
pub mod row;
pub mod sqlite;

use async_trait::async_trait;

pub use error::{DbError, DbResult};
pub use executor::{with_retry, Attempt, Cancellation, ExecutionError, RetryPolicy, RetryableExecutor};
pub use row::{CollectingSink, ConnectionInfo, QueryOptions, Row, RowSink, SqlValue};
pub use sqlite::SqliteDataSource;

/// Source of database connections.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Open a connection; `read_only` connections refuse writes.
    async fn connect(&self, read_only: bool) -> DbResult<Box<dyn Connection>>;

    /// Make the named driver available before connecting.
    fn load_driver(&self, name: &str) -> DbResult<()>;
}

/// One open connection. Dropping it releases it.
#[async_trait]
pub trait Connection: Send {
    fn info(&self) -> &ConnectionInfo;

    /// Run `sql`, pushing every row into `sink`; returns the row count.
    ///
    /// `cancel` is checked per row.
    async fn query(
        &mut self,
        sql: &str,
        options: &QueryOptions,
        sink: &mut dyn RowSink,
        cancel: &Cancellation,
    ) -> DbResult<u64>;

    /// Run a statement without a result set; returns the affected row count.
    async fn execute(&mut self, sql: &str) -> DbResult<u64>;
}
