//! SQLite-backed data source.
//!
//! SQLite calls block, so every open, statement and row fetch runs on the
//! blocking pool. Rows come back in batches of `fetch_size` over a bounded
//! channel and reach the sink on the calling task.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{InterruptHandle, OpenFlags};
use tokio::sync::mpsc;
use tracing::debug;

use super::error::{DbError, DbResult};
use super::executor::Cancellation;
use super::row::{ConnectionInfo, QueryOptions, Row, RowSink, SqlValue};
use super::{Connection, DataSource};

const DRIVER_NAME: &str = "rusqlite";
const DRIVER_VERSION: &str = "0.32";

/// How long a statement waits on another connection's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Batches buffered between the blocking reader and the sink.
const BATCHES_IN_FLIGHT: usize = 2;

/// Opens connections to one SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteDataSource {
    path: PathBuf,
}

impl SqliteDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DataSource for SqliteDataSource {
    async fn connect(&self, read_only: bool) -> DbResult<Box<dyn Connection>> {
        let path = self.path.clone();
        let conn = blocking(move || open(&path, read_only)).await?;
        debug!(path = %self.path.display(), read_only, "opened sqlite connection");

        let interrupt = conn.get_interrupt_handle();
        Ok(Box::new(SqliteConnection {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
            info: ConnectionInfo {
                driver_name: DRIVER_NAME.to_string(),
                driver_version: DRIVER_VERSION.to_string(),
                product_name: "SQLite".to_string(),
                product_version: rusqlite::version().to_string(),
            },
        }))
    }

    fn load_driver(&self, name: &str) -> DbResult<()> {
        // The only driver compiled in.
        if name.eq_ignore_ascii_case("sqlite") || name.eq_ignore_ascii_case(DRIVER_NAME) {
            Ok(())
        } else {
            Err(DbError::DriverNotLoaded(name.to_string()))
        }
    }
}

fn open(path: &Path, read_only: bool) -> DbResult<rusqlite::Connection> {
    let flags = if read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
    };
    let conn = rusqlite::Connection::open_with_flags(path, flags)
        .map_err(|e| DbError::Connect(format!("{}: {}", path.display(), e)))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if read_only {
        conn.execute_batch("PRAGMA query_only = 1;")?;
    }
    Ok(conn)
}

/// Run `f` on the blocking pool.
async fn blocking<T, F>(f: F) -> DbResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> DbResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DbError::Query(format!("sqlite worker failed: {}", e)))?
}

struct SqliteConnection {
    conn: Arc<Mutex<rusqlite::Connection>>,
    interrupt: InterruptHandle,
    info: ConnectionInfo,
}

#[async_trait]
impl Connection for SqliteConnection {
    fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    async fn query(
        &mut self,
        sql: &str,
        options: &QueryOptions,
        sink: &mut dyn RowSink,
        cancel: &Cancellation,
    ) -> DbResult<u64> {
        cancel.check()?;
        let (tx, mut rx) = mpsc::channel(BATCHES_IN_FLIGHT);
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let batch_size = options.fetch_size.max(1);
        let timeout = options.timeout;
        let worker_cancel = cancel.clone();
        let worker = tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            stream_rows(&conn, &sql, batch_size, timeout, &worker_cancel, &tx)
        });

        let mut delivered = Ok(());
        loop {
            tokio::select! {
                batch = rx.recv() => match batch {
                    Some(batch) => {
                        if let Err(e) = deliver(batch, sink, cancel) {
                            delivered = Err(e);
                            break;
                        }
                    }
                    None => break,
                },
                _ = cancel.cancelled() => {
                    self.interrupt.interrupt();
                    delivered = cancel.check();
                    break;
                }
            }
        }
        // A closed channel stops the reader at its next batch.
        drop(rx);

        let produced = worker
            .await
            .map_err(|e| DbError::Query(format!("sqlite worker failed: {}", e)))?;
        delivered?;
        let count = produced?;
        sink.finish()?;
        Ok(count)
    }

    async fn execute(&mut self, sql: &str) -> DbResult<u64> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        blocking(move || {
            let changed = conn.lock().execute(&sql, [])?;
            Ok(changed as u64)
        })
        .await
    }
}

fn deliver(batch: Vec<Row>, sink: &mut dyn RowSink, cancel: &Cancellation) -> DbResult<()> {
    cancel.check()?;
    for row in batch {
        sink.accept(row)?;
    }
    Ok(())
}

/// Step through the result set on the blocking pool, sending full batches.
/// Returns the number of rows read.
fn stream_rows(
    conn: &rusqlite::Connection,
    sql: &str,
    batch_size: usize,
    timeout: Option<Duration>,
    cancel: &Cancellation,
    tx: &mpsc::Sender<Vec<Row>>,
) -> DbResult<u64> {
    let started = Instant::now();
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();
    let mut rows = stmt.query([])?;

    let mut count = 0u64;
    let mut batch = Vec::with_capacity(batch_size.min(1024));
    while let Some(row) = rows.next()? {
        cancel.check()?;
        if let Some(timeout) = timeout {
            if started.elapsed() > timeout {
                return Err(DbError::Timeout(timeout));
            }
        }

        let mut values: Row = Vec::with_capacity(width);
        for i in 0..width {
            values.push(SqlValue::from(row.get_ref(i)?));
        }
        batch.push(values);
        count += 1;

        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size.min(1024)));
            if tx.blocking_send(full).is_err() {
                return Ok(count);
            }
        }
    }
    if !batch.is_empty() {
        // The receiver only goes away after an error it reports itself.
        let _ = tx.blocking_send(batch);
    }
    Ok(count)
}
