//! FROM clause with its joins.

use std::collections::HashMap;

use crate::model::{JoinSpec, TableRef};
use crate::sql::alias::TableAliases;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::error::{SqlGenError, SqlGenResult};
use crate::sql::info::ColumnSpecInfo;
use crate::sql::token::{Token, TokenStream};

/// Base tables redirected to staging views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRewrites {
    map: HashMap<(String, String), TableRef>,
}

impl TableRewrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, replaced: &TableRef, with: TableRef) {
        self.map
            .insert((replaced.schema.clone(), replaced.table.clone()), with);
    }

    pub fn resolve(&self, schema: &str, table: &str) -> TableRef {
        self.map
            .get(&(schema.to_string(), table.to_string()))
            .cloned()
            .unwrap_or_else(|| TableRef::new(schema, table))
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Render `FROM t a1 [JOIN t2 a2 ON a1.x = a2.y]*`.
///
/// Each alias is introduced once, at its first node. A non-first alias is
/// joined from its predecessor node when that node's join leads into it,
/// otherwise from the earliest earlier node joining into the same table.
pub fn build_from(
    info: &ColumnSpecInfo<'_>,
    aliases: &TableAliases,
    rewrites: &TableRewrites,
    dialect: Dialect,
) -> SqlGenResult<TokenStream> {
    let nodes = info.nodes();
    let mut ts = TokenStream::new();
    let mut rendered_any = false;

    for (i, node) in nodes.iter().enumerate() {
        if !aliases.introduces(i) {
            continue;
        }
        let alias = aliases.alias(i);

        if !rendered_any {
            ts.push(Token::From).space();
            push_table(&mut ts, node.schema(), node.table(), &alias, rewrites, dialect);
            rendered_any = true;
            continue;
        }

        let (source, join) = incoming_join(info, i).ok_or_else(|| SqlGenError::MissingJoin {
            schema: node.schema().to_string(),
            table: node.table().to_string(),
            alias: alias.clone(),
        })?;

        ts.space().push(Token::Join(join.join_type)).space();
        push_table(&mut ts, node.schema(), node.table(), &alias, rewrites, dialect);
        ts.space()
            .push(Token::On)
            .space()
            .column(&aliases.alias(source), &join.from_key)
            .space()
            .push(Token::Eq)
            .space()
            .column(&alias, &join.to_key);
    }

    Ok(ts)
}

/// Node whose join leads into node `index`, with that join.
fn incoming_join<'a>(info: &ColumnSpecInfo<'a>, index: usize) -> Option<(usize, &'a JoinSpec)> {
    let nodes = info.nodes();
    let node = &nodes[index];

    if let Some(prev) = node.prev {
        if let Some(join) = nodes[prev].join() {
            if join.next.same_table(node.schema(), node.table()) {
                return Some((prev, join));
            }
        }
    }

    nodes[..index].iter().enumerate().find_map(|(j, candidate)| {
        candidate
            .join()
            .filter(|join| join.next.same_table(node.schema(), node.table()))
            .map(|join| (j, join))
    })
}

fn push_table(
    ts: &mut TokenStream,
    schema: &str,
    table: &str,
    alias: &str,
    rewrites: &TableRewrites,
    dialect: Dialect,
) {
    let target = rewrites.resolve(schema, table);
    ts.push(Token::TableRef {
        schema: target.schema,
        name: target.table,
    })
    .space();
    if let Some(keyword) = dialect.table_alias_keyword() {
        ts.push(Token::Raw(keyword.to_string())).space();
    }
    ts.push(Token::Raw(alias.to_string()));
}
