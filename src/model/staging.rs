//! Staging declarations: base tables copied into pre-filtered working tables.

use serde::{Deserialize, Serialize};

/// Table addressed by schema and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

/// A column copied into the staging table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedColumn {
    pub name: String,
    /// The key column; receives the unique index.
    #[serde(default)]
    pub unique: bool,
}

impl StagedColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: false,
        }
    }

    pub fn unique(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingSpec {
    /// Base table whose reads are redirected.
    pub replaced: TableRef,
    /// Schema and name of the staging area; the union view carries this name.
    pub area: TableRef,
    pub columns: Vec<StagedColumn>,
    /// Entity names contributing rows.
    pub entities: Vec<String>,
}

impl StagingSpec {
    pub fn unique_column(&self) -> Option<&StagedColumn> {
        self.columns.iter().find(|c| c.unique)
    }

    pub fn secondary_columns(&self) -> impl Iterator<Item = &StagedColumn> {
        self.columns.iter().filter(|c| !c.unique)
    }
}
