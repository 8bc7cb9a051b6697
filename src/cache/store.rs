//! Key-value collaborator holding flushed propositions.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::model::{Proposition, UniqueId};

use super::CacheResult;

/// Where flushed propositions live until the read is collected.
///
/// Propositions are stored by unique id; each key id keeps the list of
/// unique ids appended for it.
pub trait PropositionStore: Send + Sync {
    /// Store `prop` unless its unique id is already present.
    ///
    /// Returns whether it was stored.
    fn put_if_absent(&self, prop: &Proposition) -> CacheResult<bool>;

    /// Store `prop`, replacing any proposition with the same unique id.
    fn put(&self, prop: &Proposition) -> CacheResult<()>;

    fn get(&self, uid: &UniqueId) -> CacheResult<Option<Proposition>>;

    /// Append `uid` to `key_id`'s list.
    fn append(&self, key_id: &str, uid: &UniqueId) -> CacheResult<()>;

    /// Unique ids appended for `key_id`, in append order.
    fn list(&self, key_id: &str) -> CacheResult<Vec<UniqueId>>;

    /// Every key id with at least one appended unique id, sorted.
    fn key_ids(&self) -> CacheResult<Vec<String>>;
}

/// In-memory store sharded with `dashmap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    propositions: DashMap<String, Proposition>,
    keys: DashMap<String, Vec<UniqueId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.propositions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.propositions.is_empty()
    }
}

impl PropositionStore for MemoryStore {
    fn put_if_absent(&self, prop: &Proposition) -> CacheResult<bool> {
        match self.propositions.entry(prop.unique_id.storage_key()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(prop.clone());
                Ok(true)
            }
        }
    }

    fn put(&self, prop: &Proposition) -> CacheResult<()> {
        self.propositions
            .insert(prop.unique_id.storage_key(), prop.clone());
        Ok(())
    }

    fn get(&self, uid: &UniqueId) -> CacheResult<Option<Proposition>> {
        Ok(self
            .propositions
            .get(&uid.storage_key())
            .map(|p| p.value().clone()))
    }

    fn append(&self, key_id: &str, uid: &UniqueId) -> CacheResult<()> {
        self.keys
            .entry(key_id.to_string())
            .or_default()
            .push(uid.clone());
        Ok(())
    }

    fn list(&self, key_id: &str) -> CacheResult<Vec<UniqueId>> {
        Ok(self
            .keys
            .get(key_id)
            .map(|l| l.value().clone())
            .unwrap_or_default())
    }

    fn key_ids(&self) -> CacheResult<Vec<String>> {
        let mut keys: Vec<String> = self.keys.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }
}
