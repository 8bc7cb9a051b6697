//! WHERE clause.
//!
//! Predicates are produced per entity, in walk order:
//!
//! 1. start bounds of position filters (`>=`)
//! 2. finish bounds of position filters (`<=`)
//! 3. constraint paths
//! 4. property-value filters
//! 5. the code predicate, when [`needs_prop_id_in_clause`] says so
//!
//! Consecutive entities sharing a name are alternates and are OR'ed in one
//! parenthesis; different names are AND'ed. The key-id IN list comes last.

use std::collections::BTreeSet;

use crate::model::{ColumnSpec, Filter, Operator, Side, Value};
use crate::sql::alias::TableAliases;
use crate::sql::filters::{needs_prop_id_in_clause, qualifying_ids};
use crate::sql::info::{ColumnSpecInfo, EntityColumns};
use crate::sql::token::{Token, TokenStream};
use crate::sql::SqlOptions;

use super::predicate;
use super::WhereContext;

/// Filters and requested ids for one entity of the statement.
#[derive(Debug, Clone, Default)]
pub struct EntityFilters<'f> {
    pub filters: Vec<&'f Filter>,
    pub query_ids: BTreeSet<String>,
}

/// Render the WHERE clause; empty when there is nothing to restrict.
///
/// `per_entity[i]` belongs to `info.entities()[i]`.
pub fn build_where(
    info: &ColumnSpecInfo<'_>,
    aliases: &TableAliases,
    per_entity: &[EntityFilters<'_>],
    key_ids: &[String],
    ctx: &WhereContext<'_>,
) -> TokenStream {
    let mut conjuncts: Vec<TokenStream> = Vec::new();

    let entities = info.entities();
    let mut i = 0;
    while i < entities.len() {
        let name = &entities[i].spec.name;
        let mut j = i;
        let mut members: Vec<Vec<TokenStream>> = Vec::new();
        while j < entities.len() && &entities[j].spec.name == name {
            let empty = EntityFilters::default();
            let filters = per_entity.get(j).unwrap_or(&empty);
            members.push(entity_predicates(&entities[j], info, aliases, filters, ctx));
            j += 1;
        }
        conjuncts.extend(render_group(members));
        i = j;
    }

    if !key_ids.is_empty() {
        let key = column(info, aliases, info.primary().key);
        let values = key_ids.iter().cloned().map(Token::LitString).collect();
        conjuncts.push(predicate::in_list(&key, values, false, ctx.chunk_size));
    }

    if conjuncts.is_empty() {
        return TokenStream::new();
    }
    let mut ts = TokenStream::new();
    ts.push(Token::Where)
        .space()
        .append(&TokenStream::join_with(conjuncts, Token::And));
    ts
}

/// Top-level conjuncts contributed by one group of alternates.
fn render_group(members: Vec<Vec<TokenStream>>) -> Vec<TokenStream> {
    // An alternate without predicates admits every row; the OR is vacuous.
    if members.iter().any(Vec::is_empty) {
        return Vec::new();
    }
    if members.len() == 1 {
        return members.into_iter().next().unwrap_or_default();
    }
    let disjuncts = members
        .into_iter()
        .map(|preds| {
            if preds.len() == 1 {
                preds.into_iter().next().unwrap_or_default()
            } else {
                TokenStream::join_with(preds, Token::And).parenthesized()
            }
        })
        .collect();
    vec![TokenStream::join_with(disjuncts, Token::Or).parenthesized()]
}

fn entity_predicates(
    ec: &EntityColumns<'_>,
    info: &ColumnSpecInfo<'_>,
    aliases: &TableAliases,
    filters: &EntityFilters<'_>,
    ctx: &WhereContext<'_>,
) -> Vec<TokenStream> {
    let mut preds = Vec::new();
    let positions: Vec<_> = filters.filters.iter().filter_map(|f| f.as_position()).collect();

    for f in &positions {
        if let (Some(bound), Some(node)) = (f.start, side_node(ec, f.start_side)) {
            preds.push(predicate::compare(
                &column(info, aliases, node),
                Operator::GreaterThanOrEqualTo,
                ctx.position(bound),
            ));
        }
    }
    for f in &positions {
        if let (Some(bound), Some(node)) = (f.finish, side_node(ec, f.finish_side)) {
            preds.push(predicate::compare(
                &column(info, aliases, node),
                Operator::LessThanOrEqualTo,
                ctx.position(bound),
            ));
        }
    }

    for &node in &ec.constraints {
        let spec = info.node(node).spec;
        let op = spec.constraint.unwrap_or(Operator::EqualTo);
        let values = spec.codes.keys().cloned().map(Token::LitString).collect();
        if let Some(p) = predicate::render(&column(info, aliases, node), op, values, ctx.chunk_size) {
            preds.push(p);
        }
    }

    for f in filters.filters.iter().filter_map(|f| f.as_property_value()) {
        let Some(node) = ec.property(&f.property) else {
            continue;
        };
        let values = value_tokens(&f.values, info.node(node).spec, ctx);
        if let Some(p) = predicate::render(
            &column(info, aliases, node),
            f.comparator.to_operator(),
            values,
            ctx.chunk_size,
        ) {
            preds.push(p);
        }
    }

    if let Some(node) = ec.code {
        let qualifying = qualifying_ids(ec.spec, &filters.query_ids);
        if needs_prop_id_in_clause(
            qualifying.len(),
            ec.spec.prop_ids.len(),
            ctx.options.prop_id_coverage,
            ctx.options.max_prop_ids_in_clause,
        ) {
            let spec = info.node(node).spec;
            let op = spec.constraint.unwrap_or(Operator::EqualTo);
            let codes = spec
                .codes_for_ids(&qualifying)
                .into_iter()
                .map(Token::LitString)
                .collect();
            if let Some(p) = predicate::render(&column(info, aliases, node), op, codes, ctx.chunk_size) {
                preds.push(p);
            }
        }
    }

    preds
}

fn side_node(ec: &EntityColumns<'_>, side: Side) -> Option<usize> {
    match side {
        Side::Start => ec.start,
        Side::Finish => ec.finish,
    }
}

/// Literal tokens for filter values, mapped to column codes when the
/// property column carries a code map.
fn value_tokens(values: &[Value], spec: &ColumnSpec, ctx: &WhereContext<'_>) -> Vec<Token> {
    if spec.codes.is_empty() {
        return values.iter().map(|v| literal(v, ctx)).collect();
    }
    let mut tokens = Vec::new();
    for value in values {
        let text = value.as_code_text();
        let codes = spec.codes_for_id(&text);
        if codes.is_empty() {
            tokens.push(Token::LitString(text));
        } else {
            tokens.extend(codes.into_iter().map(Token::LitString));
        }
    }
    tokens
}

fn literal(value: &Value, ctx: &WhereContext<'_>) -> Token {
    match value {
        Value::Nominal(s) => Token::LitString(s.clone()),
        Value::Number(n) => Token::LitFloat(*n),
        Value::InequalityNumber { number, .. } => Token::LitFloat(*number),
        Value::Boolean(b) => Token::LitBool(*b),
        Value::Date(ms) => ctx.position(*ms),
    }
}

pub(crate) fn column(info: &ColumnSpecInfo<'_>, aliases: &TableAliases, node: usize) -> TokenStream {
    let mut ts = TokenStream::new();
    // Terminal nodes always carry a column; ColumnSpecInfo rejects others.
    ts.column(&aliases.alias(node), info.node(node).column().unwrap_or_default());
    ts
}

impl<'o> WhereContext<'o> {
    pub fn new(options: &'o SqlOptions, chunk_size: usize) -> Self {
        Self {
            options,
            chunk_size,
        }
    }

    fn position(&self, millis: i64) -> Token {
        Token::Position {
            millis,
            format: self.options.position_format,
        }
    }
}
