//! Rows, connection facts and per-statement options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::DbResult;

/// One column value as delivered by a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    /// Epoch milliseconds.
    Timestamp(i64),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<rusqlite::types::ValueRef<'_>> for SqlValue {
    fn from(value: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
        }
    }
}

pub type Row = Vec<SqlValue>;

/// What a live connection reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub driver_name: String,
    pub driver_version: String,
    pub product_name: String,
    pub product_version: String,
}

/// Per-statement execution options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Rows fetched per round trip. SQLite reads this many rows ahead on
    /// the blocking pool before handing them to the sink.
    pub fetch_size: usize,
    pub timeout: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            fetch_size: 10_000,
            timeout: None,
        }
    }
}

/// Receives the rows of one statement.
pub trait RowSink: Send {
    fn accept(&mut self, row: Row) -> DbResult<()>;

    /// Called when the statement completed without error.
    fn finish(&mut self) -> DbResult<()> {
        Ok(())
    }

    /// Called before a failed statement is retried.
    fn reset(&mut self) {}
}

/// Sink collecting every row; handy for small lookups and tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub rows: Vec<Row>,
}

impl RowSink for CollectingSink {
    fn accept(&mut self, row: Row) -> DbResult<()> {
        self.rows.push(row);
        Ok(())
    }

    fn reset(&mut self) {
        self.rows.clear();
    }
}
