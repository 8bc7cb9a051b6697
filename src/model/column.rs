//! Column paths: the schema-navigation vocabulary of the mapping.
//!
//! A [`ColumnSpec`] is one `schema.table[.column]` step. Steps chain through
//! [`JoinSpec`]s into a singly linked path that starts at an entity's base
//! table; the terminal step names the column that is read or constrained.
//!
//! ```text
//! patients(patient_key) --JOIN patient_key = patient_key--> labs(test_code)
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Kind of join linking two path steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    #[default]
    Inner,
    LeftOuter,
}

/// Constraint applied to a path's terminal column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    EqualTo,
    NotEqualTo,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    Like,
}

/// Link from one path step to the next.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinSpec {
    #[serde(default)]
    pub join_type: JoinType,
    /// Column on the current step's table.
    pub from_key: String,
    /// Column on the next step's table.
    pub to_key: String,
    pub next: ColumnSpec,
}

/// One step of a column path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub schema: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<Box<JoinSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Operator>,
    /// SQL code -> proposition id (or property value) stored in the column.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub codes: BTreeMap<String, String>,
}

impl ColumnSpec {
    /// A step on `schema.table` with no column.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            column: None,
            join: None,
            constraint: None,
            codes: BTreeMap::new(),
        }
    }

    /// A terminal step reading `schema.table.column`.
    pub fn column(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self::new(schema, table).with_column(column)
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Chain an inner join to `next`.
    pub fn join(self, from_key: impl Into<String>, to_key: impl Into<String>, next: ColumnSpec) -> Self {
        self.join_as(JoinType::Inner, from_key, to_key, next)
    }

    pub fn join_as(
        mut self,
        join_type: JoinType,
        from_key: impl Into<String>,
        to_key: impl Into<String>,
        next: ColumnSpec,
    ) -> Self {
        self.join = Some(Box::new(JoinSpec {
            join_type,
            from_key: from_key.into(),
            to_key: to_key.into(),
            next,
        }));
        self
    }

    /// Set the constraint on this step. Only meaningful on the terminal step.
    pub fn with_constraint(mut self, op: Operator) -> Self {
        self.constraint = Some(op);
        self
    }

    /// Map an SQL code stored in the column to an id.
    pub fn with_code(mut self, code: impl Into<String>, id: impl Into<String>) -> Self {
        self.codes.insert(code.into(), id.into());
        self
    }

    /// Iterate the steps of the path, starting with `self`.
    pub fn steps(&self) -> Steps<'_> {
        Steps { next: Some(self) }
    }

    /// The last step of the path.
    pub fn terminal(&self) -> &ColumnSpec {
        let mut current = self;
        while let Some(join) = &current.join {
            current = &join.next;
        }
        current
    }

    /// Number of steps in the path.
    pub fn len(&self) -> usize {
        self.steps().count()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether schema and table match.
    pub fn same_table(&self, schema: &str, table: &str) -> bool {
        self.schema == schema && self.table == table
    }

    /// Codes of the terminal step whose mapped id is in `ids`, in code order.
    pub fn codes_for_ids(&self, ids: &BTreeSet<String>) -> Vec<String> {
        self.terminal()
            .codes
            .iter()
            .filter(|(_, id)| ids.contains(*id))
            .map(|(code, _)| code.clone())
            .collect()
    }

    /// Codes of the terminal step mapping to exactly `id`.
    pub fn codes_for_id(&self, id: &str) -> Vec<String> {
        self.terminal()
            .codes
            .iter()
            .filter(|(_, mapped)| mapped.as_str() == id)
            .map(|(code, _)| code.clone())
            .collect()
    }

    /// Id mapped from a code stored in the terminal column.
    pub fn id_for_code(&self, code: &str) -> Option<&str> {
        self.terminal().codes.get(code).map(String::as_str)
    }

    /// Distinct ids mapped by the terminal step.
    pub fn mapped_ids(&self) -> BTreeSet<&str> {
        self.terminal().codes.values().map(String::as_str).collect()
    }

    /// Human readable `schema.table.column` of the terminal step.
    pub fn describe(&self) -> String {
        let t = self.terminal();
        match &t.column {
            Some(c) => format!("{}.{}.{}", t.schema, t.table, c),
            None => format!("{}.{}", t.schema, t.table),
        }
    }
}

/// Iterator over the steps of a path.
pub struct Steps<'a> {
    next: Option<&'a ColumnSpec>,
}

impl<'a> Iterator for Steps<'a> {
    type Item = &'a ColumnSpec;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.join.as_ref().map(|j| &j.next);
        Some(current)
    }
}
