//! Select lists and the row layouts the result processors read them with.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::Operator;
use crate::sql::alias::TableAliases;
use crate::sql::dialect::Dialect;
use crate::sql::error::{SqlGenError, SqlGenResult};
use crate::sql::info::ColumnSpecInfo;
use crate::sql::token::TokenStream;

use super::predicate::like_case;
use super::where_clause::column;

/// How a main-statement row yields its proposition id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PropIdSource {
    /// The entity produces one id; every row carries it.
    Single(String),
    /// Column at `column` holds a code, mapped through `codes`.
    Code {
        column: usize,
        codes: BTreeMap<String, String>,
    },
    /// Column at `column` is a CASE expression already yielding the id.
    Case { column: usize },
}

impl PropIdSource {
    fn kind(&self) -> u8 {
        match self {
            PropIdSource::Single(_) => 0,
            PropIdSource::Code { .. } => 1,
            PropIdSource::Case { .. } => 2,
        }
    }
}

/// Zero-based column positions of a main statement's select list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectLayout {
    pub key: usize,
    pub unique_ids: Vec<usize>,
    pub prop_id: PropIdSource,
    pub start: Option<usize>,
    pub finish: Option<usize>,
    pub value: Option<usize>,
    pub properties: Vec<(String, usize)>,
    pub width: usize,
}

impl SelectLayout {
    /// Same number and kind of slots; used to decide whether two entities can
    /// share one statement.
    pub fn same_slots(&self, other: &SelectLayout) -> bool {
        self.unique_ids.len() == other.unique_ids.len()
            && self.prop_id.kind() == other.prop_id.kind()
            && self.start.is_some() == other.start.is_some()
            && self.finish.is_some() == other.finish.is_some()
            && self.value.is_some() == other.value.is_some()
            && self.properties == other.properties
    }
}

/// Zero-based column positions of a reference statement's select list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceLayout {
    pub key: usize,
    pub owner_unique_ids: Vec<usize>,
    pub target_unique_ids: Vec<usize>,
    pub width: usize,
}

struct Columns<'i, 'a> {
    info: &'i ColumnSpecInfo<'a>,
    aliases: &'i TableAliases,
    list: Vec<TokenStream>,
}

impl Columns<'_, '_> {
    fn push_node(&mut self, node: usize) -> usize {
        let col = column(self.info, self.aliases, node);
        self.push(col)
    }

    fn push(&mut self, expr: TokenStream) -> usize {
        self.list.push(expr);
        self.list.len() - 1
    }
}

/// Select list of a main statement: key, unique ids, proposition-id column
/// (if any), start, finish, value, then properties.
pub fn main_columns(
    info: &ColumnSpecInfo<'_>,
    aliases: &TableAliases,
    dialect: Dialect,
) -> SqlGenResult<(Vec<TokenStream>, SelectLayout)> {
    let primary = info.primary();
    let mut cols = Columns {
        info,
        aliases,
        list: Vec::new(),
    };

    let key = cols.push_node(primary.key);
    let unique_ids = primary
        .unique_ids
        .iter()
        .map(|&n| cols.push_node(n))
        .collect();

    let prop_id = match primary.code {
        Some(code) => {
            let terminal = info.node(code).spec;
            let mut codes = BTreeMap::new();
            for target in info.targets() {
                if let Some(node) = target.code {
                    for (code, id) in &info.node(node).spec.codes {
                        codes.entry(code.clone()).or_insert_with(|| id.clone());
                    }
                }
            }
            if terminal.constraint == Some(Operator::Like) {
                let patterns: Vec<(String, String)> = codes.into_iter().collect();
                let expr = like_case(&column(info, aliases, code), &patterns, dialect);
                PropIdSource::Case {
                    column: cols.push(expr),
                }
            } else {
                PropIdSource::Code {
                    column: cols.push_node(code),
                    codes,
                }
            }
        }
        None => {
            let id = primary
                .spec
                .single_prop_id()
                .or_else(|| primary.spec.prop_ids.first().map(String::as_str))
                .ok_or_else(|| SqlGenError::MissingPath {
                    entity: primary.spec.name.clone(),
                    what: "proposition id",
                })?;
            PropIdSource::Single(id.to_string())
        }
    };

    let start = primary.start.map(|n| cols.push_node(n));
    let finish = if primary.spec.finish_spec.is_some() {
        primary.finish.map(|n| cols.push_node(n))
    } else {
        None
    };
    let value = primary.value.map(|n| cols.push_node(n));
    let properties = primary
        .properties
        .iter()
        .map(|(p, n)| (p.name.clone(), cols.push_node(*n)))
        .collect();

    let width = cols.list.len();
    Ok((
        cols.list,
        SelectLayout {
            key,
            unique_ids,
            prop_id,
            start,
            finish,
            value,
            properties,
            width,
        },
    ))
}

/// Select list of a reference statement: key, owner unique ids, then the
/// referenced entity's unique ids.
pub fn reference_columns(
    info: &ColumnSpecInfo<'_>,
    aliases: &TableAliases,
) -> SqlGenResult<(Vec<TokenStream>, ReferenceLayout)> {
    let primary = info.primary();
    let reference = primary
        .reference
        .as_ref()
        .ok_or_else(|| SqlGenError::MissingPath {
            entity: primary.spec.name.clone(),
            what: "reference",
        })?;

    let mut cols = Columns {
        info,
        aliases,
        list: Vec::new(),
    };
    let key = cols.push_node(primary.key);
    let owner_unique_ids = primary
        .unique_ids
        .iter()
        .map(|&n| cols.push_node(n))
        .collect();
    let target_unique_ids = reference
        .unique_ids
        .iter()
        .map(|&n| cols.push_node(n))
        .collect();

    let width = cols.list.len();
    Ok((
        cols.list,
        ReferenceLayout {
            key,
            owner_unique_ids,
            target_unique_ids,
            width,
        },
    ))
}
