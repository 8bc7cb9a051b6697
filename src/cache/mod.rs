//! Proposition cache.
//!
//! Result processors hand rows to a [`ResultCache`], which batches them per
//! entity spec and flushes them into a [`PropositionStore`]. The store is a
//! plain key-value collaborator with two implementations:
//!
//! - [`MemoryStore`] - sharded in-memory maps
//! - [`SqliteStore`] - one SQLite file per mapping fingerprint, versioned and
//!   auto-cleared on version mismatch
//!
//! # Layout
//!
//! ```text
//! UniqueId -> Proposition            (store)
//! key id   -> [UniqueId]             (store, append order)
//! entity   -> [(key id, Proposition)] (pending main batch)
//! (entity, reference) -> [(owner, target)] (pending reference edges)
//! ```

mod hash;
pub mod result_cache;
pub mod sqlite_store;
pub mod store;

pub use hash::{fingerprint, FINGERPRINT_LEN};
pub use result_cache::{FlushStats, ResultCache};
pub use sqlite_store::SqliteStore;
pub use store::{MemoryStore, PropositionStore};

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to determine cache directory")]
    NoCacheDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;
