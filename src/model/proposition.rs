//! Propositions produced from result rows.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::entity::EntityKind;
use super::value::Value;

/// Identity of the row a proposition was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UniqueId {
    /// Name of the entity spec that produced the row.
    pub entity_spec: String,
    pub components: Vec<String>,
}

impl UniqueId {
    pub fn new(entity_spec: impl Into<String>, components: Vec<String>) -> Self {
        Self {
            entity_spec: entity_spec.into(),
            components,
        }
    }

    /// Stable text form used as a store key.
    pub fn storage_key(&self) -> String {
        let mut key = self.entity_spec.clone();
        for c in &self.components {
            key.push('\u{1f}');
            key.push_str(c);
        }
        key
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}^{}", self.entity_spec, self.components.join("^"))
    }
}

/// Start and finish positions in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Interval {
    pub start: Option<i64>,
    pub finish: Option<i64>,
}

impl Interval {
    pub fn new(start: Option<i64>, finish: Option<i64>) -> Self {
        Self { start, finish }
    }

    pub fn at(position: i64) -> Self {
        Self {
            start: Some(position),
            finish: Some(position),
        }
    }
}

/// Sort direction applied to each key's propositions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposition {
    pub kind: EntityKind,
    pub id: String,
    pub unique_id: UniqueId,
    #[serde(default)]
    pub interval: Interval,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, Vec<UniqueId>>,
    /// Entity spec the proposition came from; set when the batch is flushed.
    #[serde(default)]
    pub entity_spec: String,
}

impl Proposition {
    pub fn new(kind: EntityKind, id: impl Into<String>, unique_id: UniqueId) -> Self {
        Self {
            kind,
            id: id.into(),
            unique_id,
            interval: Interval::default(),
            value: None,
            properties: BTreeMap::new(),
            references: BTreeMap::new(),
            entity_spec: String::new(),
        }
    }

    /// Record a reference target, ignoring duplicates.
    ///
    /// Returns whether the target was added.
    pub fn add_reference(&mut self, name: &str, target: UniqueId) -> bool {
        let targets = self.references.entry(name.to_string()).or_default();
        if targets.contains(&target) {
            false
        } else {
            targets.push(target);
            true
        }
    }

    pub fn references_named(&self, name: &str) -> &[UniqueId] {
        self.references.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}
