//! SQL generation module.
//!
//! Turns a [`SchemaMapping`](crate::model::SchemaMapping) and a request into
//! dialect-specific SQL:
//!
//! - [`info`] - flattened column paths of one statement
//! - [`alias`] - deterministic table aliases
//! - [`clause`] - SELECT / FROM / WHERE / ORDER BY fragments
//! - [`statement`] - main, reference and staging statements
//! - [`partition`] - per-unit splitting of position filters
//! - [`ddl`] - staging DDL (CREATE TABLE AS, indexes, views, drops)
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod alias;
pub mod clause;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod filters;
pub mod info;
pub mod partition;
pub mod position;
pub mod statement;
pub mod token;


use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{FilterSet, Order};

// Re-export commonly used types at the sql module level
pub use clause::{PropIdSource, ReferenceLayout, SelectLayout, TableRewrites};
pub use dialect::{Dialect, SqlDialect, UnknownDialect};
pub use error::{SqlGenError, SqlGenResult};
pub use filters::needs_prop_id_in_clause;
pub use partition::partition;
pub use position::PositionFormat;
pub use statement::{compatible_alternates, ReferenceStatement, SelectStatement, StatementFactory};
pub use token::{Token, TokenStream};

// Re-export DDL types
pub use ddl::{
    CreateIndex, CreateTableAs, CreateUnionView, DropTable, DropView, GatherStatistics,
};

/// Knobs shaping generated statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlOptions {
    /// Largest IN list before it is split; further capped by the dialect.
    pub in_list_chunk_size: usize,
    /// Requested share of an entity's ids from which the code predicate is
    /// dropped.
    pub prop_id_coverage: f64,
    /// Most codes the code predicate may list.
    pub max_prop_ids_in_clause: usize,
    pub position_format: PositionFormat,
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self {
            in_list_chunk_size: 1000,
            prop_id_coverage: 0.85,
            max_prop_ids_in_clause: 2000,
            position_format: PositionFormat::Raw,
        }
    }
}

/// What one read asks for.
#[derive(Debug, Clone, Copy)]
pub struct QueryRequest<'r> {
    /// Keys to read; empty reads every key.
    pub key_ids: &'r [String],
    pub prop_ids: &'r BTreeSet<String>,
    pub filters: &'r FilterSet,
    pub order: Order,
}
