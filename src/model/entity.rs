//! Entity specifications: how one kind of proposition is laid out in tables.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::column::ColumnSpec;
use super::value::{Value, ValueType};

/// Shape of the propositions an entity produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Timeless fact about a key.
    Constant,
    /// Happens over an interval.
    Event,
    /// Measured at a point in time.
    PrimitiveParameter,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Constant => "constant",
            EntityKind::Event => "event",
            EntityKind::PrimitiveParameter => "primitive_parameter",
        }
    }
}

/// Calendar or fixed unit used to split long position ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionUnit {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

/// Converts a raw column text into a typed value.
///
/// Attached programmatically to a [`PropertySpec`]; mappings loaded from
/// files use the declared [`ValueType`] instead.
pub trait ValueDecoder: Send + Sync {
    fn decode(&self, raw: &str) -> Option<Value>;
}

impl<F> ValueDecoder for F
where
    F: Fn(&str) -> Option<Value> + Send + Sync,
{
    fn decode(&self, raw: &str) -> Option<Value> {
        self(raw)
    }
}

/// A named property read from a column path.
#[derive(Clone, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    pub spec: ColumnSpec,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(skip)]
    pub decoder: Option<Arc<dyn ValueDecoder>>,
}

impl PropertySpec {
    pub fn new(name: impl Into<String>, spec: ColumnSpec, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            spec,
            value_type,
            decoder: None,
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn ValueDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Decode raw column text into a value.
    ///
    /// A code map on the terminal column is applied first, then the decoder
    /// (if any), then the declared value type.
    pub fn decode(&self, raw: &str) -> Option<Value> {
        let mapped = self.spec.id_for_code(raw).unwrap_or(raw);
        match &self.decoder {
            Some(decoder) => decoder.decode(mapped),
            None => Value::parse(self.value_type, mapped),
        }
    }
}

impl fmt::Debug for PropertySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySpec")
            .field("name", &self.name)
            .field("spec", &self.spec)
            .field("value_type", &self.value_type)
            .field("decoder", &self.decoder.is_some())
            .finish()
    }
}

impl PartialEq for PropertySpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.spec == other.spec && self.value_type == other.value_type
    }
}

/// How many targets a reference may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    #[default]
    Many,
}

/// A named edge from this entity to rows of another entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    pub name: String,
    /// Name of the referenced entity.
    pub entity_name: String,
    /// Paths locating the referenced row's unique id components.
    pub unique_id_specs: Vec<ColumnSpec>,
    #[serde(default)]
    pub cardinality: Cardinality,
}

/// Declarative description of how one entity is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub name: String,
    pub kind: EntityKind,
    pub prop_ids: Vec<String>,
    /// Path to the key id column. Its first step is the entity's base table.
    pub base_spec: ColumnSpec,
    pub unique_id_specs: Vec<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_spec: Option<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_spec: Option<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_spec: Option<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_spec: Option<ColumnSpec>,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertySpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<ReferenceSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_by: Option<PartitionUnit>,
}

impl EntitySpec {
    /// A spec with only the mandatory parts; fill the rest with the `with_*` builders.
    pub fn new(
        name: impl Into<String>,
        kind: EntityKind,
        prop_ids: impl IntoIterator<Item = impl Into<String>>,
        base_spec: ColumnSpec,
        unique_id_specs: Vec<ColumnSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            prop_ids: prop_ids.into_iter().map(Into::into).collect(),
            base_spec,
            unique_id_specs,
            code_spec: None,
            start_spec: None,
            finish_spec: None,
            value_spec: None,
            value_type: ValueType::default(),
            properties: Vec::new(),
            references: Vec::new(),
            constraints: Vec::new(),
            partition_by: None,
        }
    }

    pub fn with_code(mut self, spec: ColumnSpec) -> Self {
        self.code_spec = Some(spec);
        self
    }

    pub fn with_start(mut self, spec: ColumnSpec) -> Self {
        self.start_spec = Some(spec);
        self
    }

    pub fn with_finish(mut self, spec: ColumnSpec) -> Self {
        self.finish_spec = Some(spec);
        self
    }

    pub fn with_value(mut self, spec: ColumnSpec, value_type: ValueType) -> Self {
        self.value_spec = Some(spec);
        self.value_type = value_type;
        self
    }

    pub fn with_property(mut self, property: PropertySpec) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_reference(mut self, reference: ReferenceSpec) -> Self {
        self.references.push(reference);
        self
    }

    pub fn with_constraint(mut self, spec: ColumnSpec) -> Self {
        self.constraints.push(spec);
        self
    }

    pub fn partitioned_by(mut self, unit: PartitionUnit) -> Self {
        self.partition_by = Some(unit);
        self
    }

    /// Schema and table the entity's rows originate from.
    pub fn base_table(&self) -> (&str, &str) {
        (&self.base_spec.schema, &self.base_spec.table)
    }

    /// Finish path, falling back to the start path.
    pub fn effective_finish(&self) -> Option<&ColumnSpec> {
        self.finish_spec.as_ref().or(self.start_spec.as_ref())
    }

    pub fn prop_id_set(&self) -> BTreeSet<&str> {
        self.prop_ids.iter().map(String::as_str).collect()
    }

    pub fn has_prop_id(&self, id: &str) -> bool {
        self.prop_ids.iter().any(|p| p == id)
    }

    /// Whether any of `ids` is produced by this entity.
    pub fn overlaps(&self, ids: &BTreeSet<String>) -> bool {
        self.prop_ids.iter().any(|p| ids.contains(p))
    }

    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn reference(&self, name: &str) -> Option<&ReferenceSpec> {
        self.references.iter().find(|r| r.name == name)
    }

    /// Whether one of this entity's references points at `entity_name`.
    pub fn references_entity(&self, entity_name: &str) -> bool {
        self.references.iter().any(|r| r.entity_name == entity_name)
    }

    /// The proposition id for a row when no code column is mapped.
    pub fn single_prop_id(&self) -> Option<&str> {
        match self.prop_ids.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}
