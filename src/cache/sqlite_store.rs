//! SQLite-backed proposition store.
//!
//! Propositions are kept as JSON keyed by their unique id, plus an ordered
//! key index. Each read gets its own scratch file, named after the mapping's
//! fingerprint plus a random suffix, so concurrent reads never share rows.
//! The file is removed when the store is dropped.
//!
//! # Tables
//!
//! ```text
//! propositions(uid TEXT PRIMARY KEY, value TEXT)   -- JSON Proposition
//! key_index(seq INTEGER PRIMARY KEY, key_id, uid)  -- append order per key
//! meta(key TEXT PRIMARY KEY, value TEXT)           -- store version
//! ```

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tempfile::TempPath;

use crate::model::{Proposition, UniqueId};

use super::hash::fingerprint;
use super::store::PropositionStore;
use super::{CacheError, CacheResult};

/// Current store schema version. Bump this when the stored format changes.
const STORE_VERSION: i32 = 1;

/// Proposition store in one SQLite file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    // After `conn`: the connection closes before the file is removed.
    scratch: Option<TempPath>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create the store at `path`.
    ///
    /// If the store version doesn't match, it's automatically cleared.
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            scratch: None,
        };
        store.init()?;
        Ok(store)
    }

    /// Open a scratch store for one read of `scope` (usually the mapping),
    /// under `dir` or else `<cache dir>/strata`.
    pub fn open_scratch<T: Serialize>(scope: &T, dir: Option<&Path>) -> CacheResult<Self> {
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => Self::default_dir()?,
        };
        std::fs::create_dir_all(&dir)?;
        let file = tempfile::Builder::new()
            .prefix(&format!("propositions-{}-", fingerprint(scope)?))
            .suffix(".db")
            .tempfile_in(&dir)?;
        let path = file.into_temp_path();

        let mut store = Self::open(&path)?;
        store.scratch = Some(path);
        Ok(store)
    }

    /// File removed on drop, for scratch stores.
    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch.as_deref()
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> CacheResult<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            scratch: None,
        };
        store.init()?;
        Ok(store)
    }

    /// `<cache dir>/strata`
    pub fn default_dir() -> CacheResult<PathBuf> {
        let base = dirs::cache_dir().ok_or(CacheError::NoCacheDir)?;
        Ok(base.join("strata"))
    }

    fn init(&self) -> CacheResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS propositions (
                uid TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS key_index (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                key_id TEXT NOT NULL,
                uid TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS key_index_key ON key_index (key_id);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;

        let stored_version: Option<i32> = conn
            .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
                let s: String = row.get(0)?;
                Ok(s.parse().unwrap_or(0))
            })
            .optional()?;

        if stored_version != Some(STORE_VERSION) {
            conn.execute_batch("DELETE FROM propositions; DELETE FROM key_index;")?;
            conn.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES ('version', ?)",
                params![STORE_VERSION.to_string()],
            )?;
        }
        Ok(())
    }

    /// Drop everything stored (but keep metadata).
    pub fn clear(&self) -> CacheResult<()> {
        self.conn
            .lock()
            .execute_batch("DELETE FROM propositions; DELETE FROM key_index;")?;
        Ok(())
    }

    /// Number of stored propositions.
    pub fn len(&self) -> CacheResult<usize> {
        let n: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM propositions", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl PropositionStore for SqliteStore {
    fn put_if_absent(&self, prop: &Proposition) -> CacheResult<bool> {
        let json = serde_json::to_string(prop)?;
        let rows = self.conn.lock().execute(
            "INSERT OR IGNORE INTO propositions (uid, value) VALUES (?, ?)",
            params![prop.unique_id.storage_key(), json],
        )?;
        Ok(rows > 0)
    }

    fn put(&self, prop: &Proposition) -> CacheResult<()> {
        let json = serde_json::to_string(prop)?;
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO propositions (uid, value) VALUES (?, ?)",
            params![prop.unique_id.storage_key(), json],
        )?;
        Ok(())
    }

    fn get(&self, uid: &UniqueId) -> CacheResult<Option<Proposition>> {
        let json: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM propositions WHERE uid = ?",
                params![uid.storage_key()],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    fn append(&self, key_id: &str, uid: &UniqueId) -> CacheResult<()> {
        let json = serde_json::to_string(uid)?;
        self.conn.lock().execute(
            "INSERT INTO key_index (key_id, uid) VALUES (?, ?)",
            params![key_id, json],
        )?;
        Ok(())
    }

    fn list(&self, key_id: &str) -> CacheResult<Vec<UniqueId>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT uid FROM key_index WHERE key_id = ? ORDER BY seq")?;
        let rows = stmt
            .query_map(params![key_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(CacheError::from))
            .collect()
    }

    fn key_ids(&self) -> CacheResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT DISTINCT key_id FROM key_index ORDER BY key_id")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}
