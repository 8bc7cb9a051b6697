//! Flattened view of every column path taking part in one statement.
//!
//! Column paths are singly linked (`ColumnSpec -> JoinSpec -> ColumnSpec`).
//! [`ColumnSpecInfo`] walks them once, in a fixed order, into an arena of
//! [`PathNode`]s that know their predecessor and their structural table-path
//! key. Clause builders only ever look at this arena.
//!
//! Walk order per entity: key, unique ids, code, start, finish, value,
//! properties, constraints, then the reference's unique ids (reference
//! statements only).

use crate::model::{ColumnSpec, EntitySpec, JoinSpec, JoinType, PropertySpec, ReferenceSpec};

use super::error::{SqlGenError, SqlGenResult};

/// One step of a table path: the table and the join that led into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableStep {
    pub schema: String,
    pub table: String,
    /// `(from_key, to_key, join_type)` of the incoming join.
    pub via: Option<(String, String, JoinType)>,
}

/// Structural identity of a table occurrence: the chain of tables and
/// joins walked from the path's root to reach it.
pub type TablePathKey = Vec<TableStep>;

#[derive(Debug, Clone)]
pub struct PathNode<'a> {
    pub spec: &'a ColumnSpec,
    pub prev: Option<usize>,
    pub key: TablePathKey,
    /// Index into [`ColumnSpecInfo::entities`].
    pub entity: usize,
}

impl<'a> PathNode<'a> {
    pub fn schema(&self) -> &'a str {
        &self.spec.schema
    }

    pub fn table(&self) -> &'a str {
        &self.spec.table
    }

    pub fn column(&self) -> Option<&'a str> {
        self.spec.column.as_deref()
    }

    /// Outgoing join to the next step.
    pub fn join(&self) -> Option<&'a JoinSpec> {
        self.spec.join.as_deref()
    }
}

/// Whether the entity is a statement target or only constrains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Target,
    Participant,
}

/// Terminal node indices of one entity's reference paths.
#[derive(Debug, Clone)]
pub struct ReferenceColumns<'a> {
    pub spec: &'a ReferenceSpec,
    pub unique_ids: Vec<usize>,
}

/// Positions of the semantically special nodes of one entity.
#[derive(Debug, Clone)]
pub struct EntityColumns<'a> {
    pub spec: &'a EntitySpec,
    pub role: Role,
    pub key: usize,
    pub unique_ids: Vec<usize>,
    pub code: Option<usize>,
    pub start: Option<usize>,
    pub finish: Option<usize>,
    pub value: Option<usize>,
    pub properties: Vec<(&'a PropertySpec, usize)>,
    pub constraints: Vec<usize>,
    pub reference: Option<ReferenceColumns<'a>>,
}

impl<'a> EntityColumns<'a> {
    pub fn property(&self, name: &str) -> Option<usize> {
        self.properties
            .iter()
            .find(|(p, _)| p.name == name)
            .map(|(_, idx)| *idx)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColumnSpecInfo<'a> {
    nodes: Vec<PathNode<'a>>,
    entities: Vec<EntityColumns<'a>>,
}

impl<'a> ColumnSpecInfo<'a> {
    /// Flatten the paths of `targets` (alternates sharing one select list),
    /// then those of `participants`.
    ///
    /// With `reference` set, each target's reference of that name is walked
    /// as well.
    pub fn build(
        targets: &[&'a EntitySpec],
        participants: &[&'a EntitySpec],
        reference: Option<&str>,
    ) -> SqlGenResult<Self> {
        if targets.is_empty() {
            return Err(SqlGenError::NoEntities);
        }

        let mut info = ColumnSpecInfo::default();
        for spec in targets {
            info.add_entity(spec, Role::Target, reference)?;
        }
        for spec in participants {
            info.add_entity(spec, Role::Participant, None)?;
        }
        Ok(info)
    }

    pub fn nodes(&self) -> &[PathNode<'a>] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &PathNode<'a> {
        &self.nodes[index]
    }

    pub fn entities(&self) -> &[EntityColumns<'a>] {
        &self.entities
    }

    pub fn targets(&self) -> impl Iterator<Item = &EntityColumns<'a>> {
        self.entities.iter().filter(|e| e.role == Role::Target)
    }

    /// The first target; its columns define the select list.
    pub fn primary(&self) -> &EntityColumns<'a> {
        &self.entities[0]
    }

    /// First node sitting on `schema.table`.
    pub fn first_node_on(&self, schema: &str, table: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.spec.same_table(schema, table))
    }

    fn add_entity(
        &mut self,
        spec: &'a EntitySpec,
        role: Role,
        reference: Option<&str>,
    ) -> SqlGenResult<()> {
        let entity = self.entities.len();
        let target = role == Role::Target;

        let key = self.add_path(&spec.base_spec, entity)?;
        let mut unique_ids = Vec::new();
        if target {
            for path in &spec.unique_id_specs {
                unique_ids.push(self.add_path(path, entity)?);
            }
        }
        let code = self.add_optional(spec.code_spec.as_ref(), entity)?;
        let start = self.add_optional(spec.start_spec.as_ref(), entity)?;
        let finish = self.add_optional(spec.effective_finish(), entity)?;
        let value = if target {
            self.add_optional(spec.value_spec.as_ref(), entity)?
        } else {
            None
        };

        let mut properties = Vec::with_capacity(spec.properties.len());
        for property in &spec.properties {
            properties.push((property, self.add_path(&property.spec, entity)?));
        }

        let mut constraints = Vec::with_capacity(spec.constraints.len());
        for path in &spec.constraints {
            constraints.push(self.add_path(path, entity)?);
        }

        let reference = match reference {
            Some(name) if target => {
                let reference_spec =
                    spec.reference(name)
                        .ok_or_else(|| SqlGenError::UnknownReference {
                            entity: spec.name.clone(),
                            reference: name.to_string(),
                        })?;
                let mut ids = Vec::with_capacity(reference_spec.unique_id_specs.len());
                for path in &reference_spec.unique_id_specs {
                    ids.push(self.add_path(path, entity)?);
                }
                Some(ReferenceColumns {
                    spec: reference_spec,
                    unique_ids: ids,
                })
            }
            _ => None,
        };

        self.entities.push(EntityColumns {
            spec,
            role,
            key,
            unique_ids,
            code,
            start,
            finish,
            value,
            properties,
            constraints,
            reference,
        });
        Ok(())
    }

    fn add_optional(
        &mut self,
        path: Option<&'a ColumnSpec>,
        entity: usize,
    ) -> SqlGenResult<Option<usize>> {
        path.map(|p| self.add_path(p, entity)).transpose()
    }

    /// Append every step of `path`; returns the terminal node's index.
    fn add_path(&mut self, path: &'a ColumnSpec, entity: usize) -> SqlGenResult<usize> {
        let mut key: TablePathKey = Vec::new();
        let mut prev: Option<usize> = None;
        let mut via: Option<(String, String, JoinType)> = None;

        for step in path.steps() {
            key.push(TableStep {
                schema: step.schema.clone(),
                table: step.table.clone(),
                via: via.take(),
            });
            let index = self.nodes.len();
            self.nodes.push(PathNode {
                spec: step,
                prev,
                key: key.clone(),
                entity,
            });
            prev = Some(index);
            via = step
                .join
                .as_ref()
                .map(|j| (j.from_key.clone(), j.to_key.clone(), j.join_type));
        }

        // `steps()` always yields at least the path itself.
        let terminal = self.nodes.len() - 1;
        if self.nodes[terminal].spec.column.is_none() {
            return Err(SqlGenError::MissingColumn {
                path: path.describe(),
            });
        }
        Ok(terminal)
    }
}

/// Shape of a path ignoring constraints and code maps; equal shapes read the
/// same column through the same joins.
pub fn path_shape(path: &ColumnSpec) -> (TablePathKey, Option<String>) {
    let mut key = Vec::new();
    let mut via = None;
    for step in path.steps() {
        key.push(TableStep {
            schema: step.schema.clone(),
            table: step.table.clone(),
            via: via.take(),
        });
        via = step
            .join
            .as_ref()
            .map(|j| (j.from_key.clone(), j.to_key.clone(), j.join_type));
    }
    (key, path.terminal().column.clone())
}
