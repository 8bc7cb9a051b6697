//! Errors raised while modelling a statement from the mapping.

use thiserror::Error;

/// The mapping cannot be turned into a statement. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlGenError {
    #[error("No join leads into table {schema}.{table} (alias {alias})")]
    MissingJoin {
        schema: String,
        table: String,
        alias: String,
    },

    #[error("Path {path} has no terminal column")]
    MissingColumn { path: String },

    #[error("Entity '{entity}' has no '{what}' path")]
    MissingPath { entity: String, what: &'static str },

    #[error("No entity specs to build a statement for")]
    NoEntities,

    #[error("Entity '{entity}' has no reference named '{reference}'")]
    UnknownReference { entity: String, reference: String },

    #[error("Staged table {schema}.{table} is not on any path of entity '{entity}'")]
    StagedTableNotOnPath {
        schema: String,
        table: String,
        entity: String,
    },
}

pub type SqlGenResult<T> = Result<T, SqlGenError>;
