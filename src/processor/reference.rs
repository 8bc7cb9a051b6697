//! Rows of a reference statement into pending reference edges.

use tracing::{debug, warn};

use crate::cache::ResultCache;
use crate::db::{DbError, DbResult, Row, RowSink};
use crate::model::{ReferenceSpec, UniqueId};
use crate::sql::ReferenceLayout;

use super::decode::text_of;

/// Queues one edge per row: owner unique id to referenced unique id.
pub struct ReferenceProcessor<'a> {
    cache: &'a ResultCache,
    entity: &'a str,
    reference: &'a ReferenceSpec,
    layout: &'a ReferenceLayout,
    flush_rows: usize,
    batched: usize,
    edges: u64,
}

impl<'a> ReferenceProcessor<'a> {
    pub fn new(
        cache: &'a ResultCache,
        entity: &'a str,
        reference: &'a ReferenceSpec,
        layout: &'a ReferenceLayout,
        flush_rows: usize,
    ) -> Self {
        Self {
            cache,
            entity,
            reference,
            layout,
            flush_rows: flush_rows.max(1),
            batched: 0,
            edges: 0,
        }
    }

    pub fn edges(&self) -> u64 {
        self.edges
    }

    fn flush(&mut self) -> DbResult<()> {
        self.cache
            .flush_references(self.entity, &self.reference.name)
            .map_err(|e| DbError::Sink(e.to_string()))?;
        self.batched = 0;
        Ok(())
    }
}

fn components(row: &Row, columns: &[usize]) -> Option<Vec<String>> {
    columns.iter().map(|&i| text_of(&row[i])).collect()
}

impl RowSink for ReferenceProcessor<'_> {
    fn accept(&mut self, row: Row) -> DbResult<()> {
        if row.len() < self.layout.width {
            return Err(DbError::Sink(format!(
                "expected {} columns, got {}",
                self.layout.width,
                row.len()
            )));
        }

        let Some(owner) = components(&row, &self.layout.owner_unique_ids) else {
            warn!(entity = self.entity, reference = %self.reference.name, "skipping row with null unique id");
            return Ok(());
        };
        // Outer-joined references yield nulls when there is no target.
        let Some(target) = components(&row, &self.layout.target_unique_ids) else {
            debug!(entity = self.entity, reference = %self.reference.name, "row has no reference target");
            return Ok(());
        };

        self.cache.add_reference(
            self.entity,
            &self.reference.name,
            UniqueId::new(self.entity, owner),
            UniqueId::new(&self.reference.entity_name, target),
        );
        self.edges += 1;
        self.batched += 1;
        if self.batched >= self.flush_rows {
            self.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> DbResult<()> {
        self.flush()
    }

    fn reset(&mut self) {
        self.cache.discard_references(self.entity, &self.reference.name);
        self.batched = 0;
        self.edges = 0;
    }
}
