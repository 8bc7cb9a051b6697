//! The schema mapping: every entity spec plus staging declarations.
//!
//! Mappings are loaded from TOML or JSON and validated once; afterwards they
//! are shared read-only (usually behind an `Arc`) for the life of the process.
//!
//! ```toml
//! [[entities]]
//! name = "Lab"
//! kind = "primitive_parameter"
//! prop_ids = ["Glucose", "Sodium"]
//! base_spec = { schema = "ehr", table = "labs", column = "keyid" }
//! unique_id_specs = [{ schema = "ehr", table = "labs", column = "lab_id" }]
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::column::ColumnSpec;
use super::entity::{EntityKind, EntitySpec};
use super::staging::StagingSpec;

/// Errors raised while loading or validating a mapping.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Unsupported file extension: {extension}. Supported: .toml, .json")]
    UnsupportedExtension { extension: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Entity '{entity}' is invalid: {message}")]
    InvalidEntity { entity: String, message: String },

    #[error("Entity '{entity}' references unknown entity '{target}' via '{reference}'")]
    UnknownReference {
        entity: String,
        reference: String,
        target: String,
    },

    #[error("Staging area '{area}' names unknown entity '{entity}'")]
    UnknownStagedEntity { area: String, entity: String },

    #[error("Staging area '{area}' is invalid: {message}")]
    InvalidStaging { area: String, message: String },
}

impl MappingError {
    fn entity(spec: &EntitySpec, message: impl Into<String>) -> Self {
        MappingError::InvalidEntity {
            entity: spec.name.clone(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaMapping {
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
    #[serde(default)]
    pub staging: Vec<StagingSpec>,
}

impl SchemaMapping {
    pub fn new(entities: Vec<EntitySpec>) -> Self {
        Self {
            entities,
            staging: Vec::new(),
        }
    }

    pub fn with_staging(mut self, spec: StagingSpec) -> Self {
        self.staging.push(spec);
        self
    }

    // =========================================================================
    // Loading
    // =========================================================================

    pub fn from_toml_str(text: &str) -> Result<Self, MappingError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, MappingError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load and validate a mapping, picking the format from the file extension.
    pub fn from_file(path: &Path) -> Result<Self, MappingError> {
        if !path.exists() {
            return Err(MappingError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let text = std::fs::read_to_string(path)?;

        let mapping = match extension.as_str() {
            "toml" => Self::from_toml_str(&text)?,
            "json" => Self::from_json_str(&text)?,
            _ => return Err(MappingError::UnsupportedExtension { extension }),
        };
        mapping.validate()?;
        Ok(mapping)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check structural rules that SQL generation relies on.
    pub fn validate(&self) -> Result<(), MappingError> {
        let names: HashSet<&str> = self.entities.iter().map(|e| e.name.as_str()).collect();

        for spec in &self.entities {
            validate_entity(spec)?;

            for reference in &spec.references {
                if !names.contains(reference.entity_name.as_str()) {
                    return Err(MappingError::UnknownReference {
                        entity: spec.name.clone(),
                        reference: reference.name.clone(),
                        target: reference.entity_name.clone(),
                    });
                }
                if reference.unique_id_specs.is_empty() {
                    return Err(MappingError::entity(
                        spec,
                        format!("reference '{}' has no unique id paths", reference.name),
                    ));
                }
            }
        }

        for staging in &self.staging {
            let area = format!("{}.{}", staging.area.schema, staging.area.table);
            for entity in &staging.entities {
                if !names.contains(entity.as_str()) {
                    return Err(MappingError::UnknownStagedEntity {
                        area,
                        entity: entity.clone(),
                    });
                }
            }
            if staging.columns.iter().filter(|c| c.unique).count() != 1 {
                return Err(MappingError::InvalidStaging {
                    area,
                    message: "exactly one staged column must be flagged unique".into(),
                });
            }
        }

        Ok(())
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn entity_by_name(&self, name: &str) -> Option<&EntitySpec> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// All specs sharing `name`, in declaration order.
    pub fn alternates(&self, name: &str) -> Vec<&EntitySpec> {
        self.entities.iter().filter(|e| e.name == name).collect()
    }

    /// Specs producing any of `prop_ids`: constants first, then events, then
    /// primitive parameters, declaration order within a kind.
    pub fn entities_for_prop_ids(&self, prop_ids: &BTreeSet<String>) -> Vec<&EntitySpec> {
        let mut specs: Vec<&EntitySpec> = self
            .entities
            .iter()
            .filter(|e| e.overlaps(prop_ids))
            .collect();
        specs.sort_by_key(|e| e.kind);
        specs
    }

    /// Specs holding a reference to the entity named `name`.
    pub fn inbound_references(&self, name: &str) -> Vec<&EntitySpec> {
        self.entities
            .iter()
            .filter(|e| e.references_entity(name))
            .collect()
    }

    /// Staging spec replacing `schema.table`, if any.
    pub fn staging_for(&self, schema: &str, table: &str) -> Option<&StagingSpec> {
        self.staging
            .iter()
            .find(|s| s.replaced.schema == schema && s.replaced.table == table)
    }

    /// Entity names grouped by kind, for reporting.
    pub fn summary(&self) -> BTreeMap<EntityKind, Vec<&str>> {
        let mut out: BTreeMap<EntityKind, Vec<&str>> = BTreeMap::new();
        for spec in &self.entities {
            let names = out.entry(spec.kind).or_default();
            if !names.contains(&spec.name.as_str()) {
                names.push(&spec.name);
            }
        }
        out
    }
}

fn validate_entity(spec: &EntitySpec) -> Result<(), MappingError> {
    if spec.prop_ids.is_empty() {
        return Err(MappingError::entity(spec, "no proposition ids"));
    }
    if spec.unique_id_specs.is_empty() {
        return Err(MappingError::entity(spec, "no unique id paths"));
    }
    if spec.base_spec.terminal().column.is_none() {
        return Err(MappingError::entity(spec, "key path has no terminal column"));
    }

    match spec.kind {
        EntityKind::Event if spec.start_spec.is_none() || spec.finish_spec.is_none() => {
            return Err(MappingError::entity(spec, "events need start and finish paths"));
        }
        EntityKind::PrimitiveParameter if spec.start_spec.is_none() => {
            return Err(MappingError::entity(
                spec,
                "primitive parameters need a start path",
            ));
        }
        _ => {}
    }

    if spec.partition_by.is_some() && spec.start_spec.is_none() {
        return Err(MappingError::entity(spec, "partitioning needs a start path"));
    }

    let mut seen = HashSet::new();
    for property in &spec.properties {
        if !seen.insert(property.name.as_str()) {
            return Err(MappingError::entity(
                spec,
                format!("duplicate property '{}'", property.name),
            ));
        }
    }

    for path in all_paths(spec) {
        for step in path.steps() {
            if !step.codes.is_empty() && (step.join.is_some() || step.column.is_none()) {
                return Err(MappingError::entity(
                    spec,
                    format!("code map on {} without a terminal column", path.describe()),
                ));
            }
        }
    }

    match &spec.code_spec {
        Some(code) => {
            let mapped = code.mapped_ids();
            if let Some(missing) = spec.prop_ids.iter().find(|id| !mapped.contains(id.as_str())) {
                return Err(MappingError::entity(
                    spec,
                    format!("proposition id '{}' has no code", missing),
                ));
            }
        }
        None if spec.prop_ids.len() > 1 => {
            return Err(MappingError::entity(
                spec,
                "several proposition ids need a code path",
            ));
        }
        None => {}
    }

    Ok(())
}

fn all_paths(spec: &EntitySpec) -> impl Iterator<Item = &ColumnSpec> {
    std::iter::once(&spec.base_spec)
        .chain(spec.unique_id_specs.iter())
        .chain(spec.code_spec.iter())
        .chain(spec.start_spec.iter())
        .chain(spec.finish_spec.iter())
        .chain(spec.value_spec.iter())
        .chain(spec.properties.iter().map(|p| &p.spec))
        .chain(spec.references.iter().flat_map(|r| r.unique_id_specs.iter()))
        .chain(spec.constraints.iter())
}
