//! Statement execution with retries and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::error::{DbError, DbResult};
use super::row::{QueryOptions, RowSink};
use super::DataSource;

/// How often and how patiently a failed statement is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

/// Caller-side stop signal: an explicit flag plus an optional deadline.
///
/// Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Err` once cancelled or past the deadline.
    pub fn check(&self) -> DbResult<()> {
        if self.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(DbError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolves when cancelled or when the deadline passes.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            match self.deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => return,
                    }
                }
                None => notified.await,
            }
        }
    }
}

/// Why execution gave up.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Every attempt failed with a retriable error.
    #[error("query failed after {} attempt(s): {}", .attempts.len(), summarize(.attempts))]
    Exhausted { attempts: Vec<DbError> },

    /// A non-retriable error, cancellation included.
    #[error(transparent)]
    Aborted(DbError),
}

impl ExecutionError {
    /// Every error seen, in attempt order.
    pub fn errors(&self) -> Vec<&DbError> {
        match self {
            ExecutionError::Exhausted { attempts } => attempts.iter().collect(),
            ExecutionError::Aborted(e) => vec![e],
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, ExecutionError::Aborted(e) if e.is_cancellation())
    }
}

fn summarize(errors: &[DbError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("#{}: {}", i + 1, e))
        .collect::<Vec<_>>()
        .join("; ")
}

/// One retriable unit of work.
#[async_trait]
pub trait Attempt: Send {
    type Output: Send;

    /// Run attempt number `attempt` (1-based).
    async fn run(&mut self, attempt: u32) -> DbResult<Self::Output>;
}

/// Run `op` until it succeeds, fails with a non-retriable error, or
/// `policy.attempts` are used up. The delay between attempts is raced
/// against `cancel`.
pub async fn with_retry<A: Attempt>(
    policy: &RetryPolicy,
    cancel: &Cancellation,
    op: &mut A,
) -> Result<A::Output, ExecutionError> {
    let attempts = policy.attempts.max(1);
    let mut errors = Vec::new();

    for attempt in 1..=attempts {
        cancel.check().map_err(ExecutionError::Aborted)?;

        match op.run(attempt).await {
            Ok(output) => return Ok(output),
            Err(e) if !e.is_retriable() => return Err(ExecutionError::Aborted(e)),
            Err(e) => {
                warn!(attempt, attempts, error = %e, "attempt failed");
                errors.push(e);
            }
        }

        if attempt < attempts {
            tokio::select! {
                _ = tokio::time::sleep(policy.delay) => {}
                _ = cancel.cancelled() => {
                    let reason = cancel.check().err().unwrap_or(DbError::Cancelled);
                    return Err(ExecutionError::Aborted(reason));
                }
            }
        }
    }

    Err(ExecutionError::Exhausted { attempts: errors })
}

struct QueryAttempt<'a> {
    source: &'a dyn DataSource,
    sql: &'a str,
    options: &'a QueryOptions,
    sink: &'a mut dyn RowSink,
    cancel: &'a Cancellation,
}

#[async_trait]
impl<'a> Attempt for QueryAttempt<'a> {
    type Output = u64;

    async fn run(&mut self, attempt: u32) -> DbResult<u64> {
        if attempt > 1 {
            self.sink.reset();
        }
        // Released when `conn` drops, on every path out of this block.
        let mut conn = self.source.connect(true).await?;
        conn.query(self.sql, self.options, &mut *self.sink, self.cancel)
            .await
    }
}

/// Runs statements against a [`DataSource`] with a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryableExecutor {
    source: Arc<dyn DataSource>,
    policy: RetryPolicy,
    options: QueryOptions,
}

impl std::fmt::Debug for RetryableExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryableExecutor")
            .field("policy", &self.policy)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RetryableExecutor {
    pub fn new(source: Arc<dyn DataSource>, policy: RetryPolicy, options: QueryOptions) -> Self {
        Self {
            source,
            policy,
            options,
        }
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// Stream the rows of `sql` into `sink` on a fresh read-only connection.
    pub async fn execute(
        &self,
        sql: &str,
        sink: &mut dyn RowSink,
        cancel: &Cancellation,
    ) -> Result<u64, ExecutionError> {
        let mut attempt = QueryAttempt {
            source: self.source.as_ref(),
            sql,
            options: &self.options,
            sink,
            cancel,
        };
        let rows = with_retry(&self.policy, cancel, &mut attempt).await?;
        debug!(rows, "statement complete");
        Ok(rows)
    }

    /// Run one DDL statement on a writable connection. Never retried.
    pub async fn execute_ddl(&self, sql: &str) -> DbResult<u64> {
        let mut conn = self.source.connect(false).await?;
        debug!(%sql, "executing ddl");
        conn.execute(sql).await
    }
}
