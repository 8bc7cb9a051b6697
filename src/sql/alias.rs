//! Table alias assignment.
//!
//! Aliases are handed out by first occurrence, scanning the path nodes left
//! to right: each distinct [`TablePathKey`] gets the next `a<N>`. Nodes
//! reached through the same chain of joins share one alias, so rendering the
//! same statement twice always yields the same aliases.

use std::collections::HashMap;

use super::info::{ColumnSpecInfo, TablePathKey};

#[derive(Debug, Default)]
pub struct TableAliaser {
    by_key: HashMap<TablePathKey, usize>,
    next: usize,
}

impl TableAliaser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alias number for `key`, and whether it was assigned by this call.
    pub fn alias_for(&mut self, key: &TablePathKey) -> (usize, bool) {
        if let Some(n) = self.by_key.get(key) {
            return (*n, false);
        }
        self.next += 1;
        self.by_key.insert(key.clone(), self.next);
        (self.next, true)
    }

    /// Assign aliases to every node of `info`.
    pub fn assign(info: &ColumnSpecInfo<'_>) -> TableAliases {
        let mut aliaser = TableAliaser::new();
        let mut numbers = Vec::with_capacity(info.nodes().len());
        let mut introduces = Vec::with_capacity(info.nodes().len());
        for node in info.nodes() {
            let (n, fresh) = aliaser.alias_for(&node.key);
            numbers.push(n);
            introduces.push(fresh);
        }
        TableAliases {
            numbers,
            introduces,
        }
    }
}

/// Alias of every node of one [`ColumnSpecInfo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAliases {
    numbers: Vec<usize>,
    introduces: Vec<bool>,
}

impl TableAliases {
    pub fn alias(&self, node: usize) -> String {
        format!("a{}", self.numbers[node])
    }

    pub fn number(&self, node: usize) -> usize {
        self.numbers[node]
    }

    /// Whether `node` is the first occurrence of its alias.
    pub fn introduces(&self, node: usize) -> bool {
        self.introduces[node]
    }

    pub fn count(&self) -> usize {
        self.numbers.iter().copied().max().unwrap_or(0)
    }
}
