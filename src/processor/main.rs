//! Rows of a main statement into propositions.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::cache::ResultCache;
use crate::db::{DbError, DbResult, Row, RowSink};
use crate::model::{EntityKind, EntitySpec, Interval, Proposition, UniqueId};
use crate::sql::{PropIdSource, SelectLayout};

use super::decode::{decode_value, position_of, text_of};

/// Builds one proposition per row and queues it in the [`ResultCache`].
pub struct MainProcessor<'a> {
    cache: &'a ResultCache,
    spec: &'a EntitySpec,
    layout: &'a SelectLayout,
    requested: &'a BTreeSet<String>,
    flush_rows: usize,
    batched: usize,
    accepted: u64,
    skipped: u64,
}

impl<'a> MainProcessor<'a> {
    /// `spec` is the primary target of the statement; its name tags every
    /// proposition and its property specs decode the property columns.
    pub fn new(
        cache: &'a ResultCache,
        spec: &'a EntitySpec,
        layout: &'a SelectLayout,
        requested: &'a BTreeSet<String>,
        flush_rows: usize,
    ) -> Self {
        Self {
            cache,
            spec,
            layout,
            requested,
            flush_rows: flush_rows.max(1),
            batched: 0,
            accepted: 0,
            skipped: 0,
        }
    }

    /// Propositions queued since the processor was created or reset.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Rows dropped for a null key or unique id.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn flush(&mut self) -> DbResult<()> {
        self.cache
            .flush(&self.spec.name)
            .map_err(|e| DbError::Sink(e.to_string()))?;
        self.batched = 0;
        Ok(())
    }

    fn prop_id(&self, row: &Row) -> Option<String> {
        match &self.layout.prop_id {
            PropIdSource::Single(id) => Some(id.clone()),
            PropIdSource::Code { column, codes } => {
                text_of(&row[*column]).and_then(|code| codes.get(&code).cloned())
            }
            PropIdSource::Case { column } => text_of(&row[*column]),
        }
    }

    fn build(&self, row: &Row, prop_id: String, components: Vec<String>) -> Proposition {
        let spec = self.spec;
        let layout = self.layout;
        let mut prop = Proposition::new(spec.kind, prop_id, UniqueId::new(&spec.name, components));

        if spec.kind != EntityKind::Constant {
            let start = layout.start.and_then(|i| position_of(&row[i]));
            let finish = match layout.finish {
                Some(i) => position_of(&row[i]),
                None => start,
            };
            prop.interval = Interval::new(start, finish);
        }

        if let (Some(i), Some(value_spec)) = (layout.value, &spec.value_spec) {
            prop.value = decode_value(value_spec, spec.value_type, &row[i]);
        }

        for (name, i) in &layout.properties {
            let decoded = spec
                .property(name)
                .zip(text_of(&row[*i]))
                .and_then(|(property, raw)| property.decode(&raw));
            if let Some(value) = decoded {
                prop.properties.insert(name.clone(), value);
            }
        }
        prop
    }
}

impl RowSink for MainProcessor<'_> {
    fn accept(&mut self, row: Row) -> DbResult<()> {
        if row.len() < self.layout.width {
            return Err(DbError::Sink(format!(
                "expected {} columns, got {}",
                self.layout.width,
                row.len()
            )));
        }

        let Some(key_id) = text_of(&row[self.layout.key]) else {
            warn!(entity = %self.spec.name, "skipping row with null key id");
            self.skipped += 1;
            return Ok(());
        };

        let mut components = Vec::with_capacity(self.layout.unique_ids.len());
        for &i in &self.layout.unique_ids {
            match text_of(&row[i]) {
                Some(component) => components.push(component),
                None => {
                    warn!(entity = %self.spec.name, %key_id, "skipping row with null unique id");
                    self.skipped += 1;
                    return Ok(());
                }
            }
        }

        let Some(prop_id) = self.prop_id(&row) else {
            debug!(entity = %self.spec.name, "row has no mapped proposition id");
            return Ok(());
        };
        if !self.requested.is_empty() && !self.requested.contains(&prop_id) {
            return Ok(());
        }

        let prop = self.build(&row, prop_id, components);
        self.cache.add(&self.spec.name, key_id, prop);
        self.accepted += 1;
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
        self.cache.discard(&self.spec.name);
        self.batched = 0;
        self.accepted = 0;
        self.skipped = 0;
    }
}
