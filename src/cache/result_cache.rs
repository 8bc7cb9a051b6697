//! Batching front of the proposition store.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::model::{Order, Proposition, UniqueId};

use super::store::PropositionStore;
use super::CacheResult;

/// Rows seen by one entity spec name since its last `start_generation`.
#[derive(Debug, Clone, Copy, Default)]
struct Generation {
    number: u64,
    rows: u64,
}

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Batch entries moved out of the pending map.
    pub flushed: usize,
    /// Entries that were new to the store.
    pub stored: usize,
}

/// Collects propositions and reference edges per entity spec name and moves
/// them into a [`PropositionStore`] on flush.
///
/// Batches are sharded by entity spec name, so processors for different
/// entities never contend.
pub struct ResultCache {
    store: Arc<dyn PropositionStore>,
    batches: DashMap<String, Vec<(String, Proposition)>>,
    edges: DashMap<(String, String), Vec<(UniqueId, UniqueId)>>,
    generations: DashMap<String, Generation>,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("pending_batches", &self.batches.len())
            .field("pending_edges", &self.edges.len())
            .finish_non_exhaustive()
    }
}

impl ResultCache {
    pub fn new(store: Arc<dyn PropositionStore>) -> Self {
        Self {
            store,
            batches: DashMap::new(),
            edges: DashMap::new(),
            generations: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn PropositionStore> {
        &self.store
    }

    // ========================================================================
    // Main propositions
    // ========================================================================

    /// Begin a new generation for `entity`; its row count restarts at zero.
    pub fn start_generation(&self, entity: &str) -> u64 {
        let mut generation = self.generations.entry(entity.to_string()).or_default();
        generation.number += 1;
        generation.rows = 0;
        generation.number
    }

    /// Queue `prop` under `key_id` for `entity`.
    pub fn add(&self, entity: &str, key_id: String, prop: Proposition) {
        self.batches
            .entry(entity.to_string())
            .or_default()
            .push((key_id, prop));
    }

    /// Number of propositions queued for `entity`.
    pub fn pending(&self, entity: &str) -> usize {
        self.batches.get(entity).map(|b| b.len()).unwrap_or(0)
    }

    /// Move `entity`'s batch into the store, tagging each proposition with
    /// the entity spec name.
    ///
    /// A unique id already in the store is not stored or appended again.
    pub fn flush(&self, entity: &str) -> CacheResult<FlushStats> {
        let batch = match self.batches.get_mut(entity) {
            Some(mut pending) => std::mem::take(&mut *pending),
            None => return Ok(FlushStats::default()),
        };

        let mut stats = FlushStats {
            flushed: batch.len(),
            stored: 0,
        };
        for (key_id, mut prop) in batch {
            prop.entity_spec = entity.to_string();
            if self.store.put_if_absent(&prop)? {
                self.store.append(&key_id, &prop.unique_id)?;
                stats.stored += 1;
            }
        }

        self.generations.entry(entity.to_string()).or_default().rows += stats.flushed as u64;
        if stats.flushed > 0 {
            info!(entity, flushed = stats.flushed, stored = stats.stored, "flushed propositions");
        }
        Ok(stats)
    }

    /// Drop `entity`'s unflushed batch.
    pub fn discard(&self, entity: &str) {
        if let Some(mut pending) = self.batches.get_mut(entity) {
            debug!(entity, dropped = pending.len(), "discarding batch");
            pending.clear();
        }
    }

    /// Whether the current generation of `entity` flushed any rows.
    pub fn latest_generation_has_rows(&self, entity: &str) -> bool {
        self.generations
            .get(entity)
            .map(|g| g.rows > 0)
            .unwrap_or(false)
    }

    // ========================================================================
    // Reference edges
    // ========================================================================

    /// Queue an edge from `owner` to `target` along `reference` of `entity`.
    pub fn add_reference(&self, entity: &str, reference: &str, owner: UniqueId, target: UniqueId) {
        self.edges
            .entry((entity.to_string(), reference.to_string()))
            .or_default()
            .push((owner, target));
    }

    pub fn pending_references(&self, entity: &str, reference: &str) -> usize {
        self.edges
            .get(&(entity.to_string(), reference.to_string()))
            .map(|e| e.len())
            .unwrap_or(0)
    }

    /// Apply queued edges to their stored owners.
    ///
    /// Owners missing from the store are skipped; their rows were filtered
    /// out of the main statement.
    pub fn flush_references(&self, entity: &str, reference: &str) -> CacheResult<FlushStats> {
        let key = (entity.to_string(), reference.to_string());
        let edges = match self.edges.get_mut(&key) {
            Some(mut pending) => std::mem::take(&mut *pending),
            None => return Ok(FlushStats::default()),
        };

        let mut stats = FlushStats {
            flushed: edges.len(),
            stored: 0,
        };
        let mut skipped = 0usize;
        for (owner, target) in edges {
            match self.store.get(&owner)? {
                Some(mut prop) => {
                    if prop.add_reference(reference, target) {
                        self.store.put(&prop)?;
                        stats.stored += 1;
                    }
                }
                None => skipped += 1,
            }
        }

        if stats.flushed > 0 {
            info!(entity, reference, applied = stats.stored, skipped, "flushed references");
        }
        Ok(stats)
    }

    /// Drop queued edges for `reference` of `entity`.
    pub fn discard_references(&self, entity: &str, reference: &str) {
        if let Some(mut pending) = self.edges.get_mut(&(entity.to_string(), reference.to_string())) {
            pending.clear();
        }
    }

    // ========================================================================
    // Collection
    // ========================================================================

    /// Stored propositions per key id, sorted by interval in `order`.
    ///
    /// An empty `key_ids` collects every stored key; an empty `prop_ids`
    /// keeps every proposition id. Keys without propositions are omitted.
    pub fn collect(
        &self,
        key_ids: &[String],
        prop_ids: &BTreeSet<String>,
        order: Order,
    ) -> CacheResult<BTreeMap<String, Vec<Proposition>>> {
        let keys = if key_ids.is_empty() {
            self.store.key_ids()?
        } else {
            key_ids.to_vec()
        };

        let mut out = BTreeMap::new();
        for key in keys {
            let mut seen = BTreeSet::new();
            let mut props = Vec::new();
            for uid in self.store.list(&key)? {
                if !seen.insert(uid.clone()) {
                    continue;
                }
                if let Some(prop) = self.store.get(&uid)? {
                    if prop_ids.is_empty() || prop_ids.contains(&prop.id) {
                        props.push(prop);
                    }
                }
            }
            if props.is_empty() {
                continue;
            }
            props.sort_by(|a, b| compare(a, b, order));
            out.insert(key, props);
        }
        Ok(out)
    }
}

fn compare(a: &Proposition, b: &Proposition, order: Order) -> Ordering {
    let by_interval = a
        .interval
        .start
        .cmp(&b.interval.start)
        .then(a.interval.finish.cmp(&b.interval.finish));
    let by_interval = match order {
        Order::Ascending => by_interval,
        Order::Descending => by_interval.reverse(),
    };
    by_interval
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.unique_id.cmp(&b.unique_id))
}
