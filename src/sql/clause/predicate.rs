//! Column predicates: comparisons, chunked IN lists, LIKE patterns and CASE.

use crate::model::Operator;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::token::{Token, TokenStream};

fn operator_token(op: Operator) -> Token {
    match op {
        Operator::EqualTo => Token::Eq,
        Operator::NotEqualTo => Token::Ne,
        Operator::LessThan => Token::Lt,
        Operator::LessThanOrEqualTo => Token::Lte,
        Operator::GreaterThan => Token::Gt,
        Operator::GreaterThanOrEqualTo => Token::Gte,
        Operator::Like => Token::Like,
    }
}

/// `column <op> value`
pub fn compare(column: &TokenStream, op: Operator, value: Token) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.append(column)
        .space()
        .push(operator_token(op))
        .space()
        .push(value);
    ts
}

/// Predicate applying `op` to `column` against `values`.
///
/// - equal-to: `=` for one value, IN list otherwise
/// - not-equal-to: `<>` for one value, NOT IN list otherwise
/// - anything else: one comparison per value, OR'ed in parentheses
///
/// Returns `None` when there are no values.
pub fn render(
    column: &TokenStream,
    op: Operator,
    values: Vec<Token>,
    chunk_size: usize,
) -> Option<TokenStream> {
    match values.len() {
        0 => None,
        1 => values.into_iter().next().map(|v| compare(column, op, v)),
        _ => Some(match op {
            Operator::EqualTo => in_list(column, values, false, chunk_size),
            Operator::NotEqualTo => in_list(column, values, true, chunk_size),
            _ => {
                let parts = values.into_iter().map(|v| compare(column, op, v)).collect();
                TokenStream::join_with(parts, Token::Or).parenthesized()
            }
        }),
    }
}

/// `column [NOT] IN (...)`, split into lists of at most `chunk_size`.
///
/// Several chunks are OR'ed (AND'ed when negated) inside parentheses.
pub fn in_list(
    column: &TokenStream,
    values: Vec<Token>,
    negated: bool,
    chunk_size: usize,
) -> TokenStream {
    let chunk_size = chunk_size.max(1);
    let chunks: Vec<TokenStream> = values
        .chunks(chunk_size)
        .map(|chunk| {
            let mut ts = TokenStream::new();
            ts.append(column).space();
            if negated {
                ts.push(Token::Not).space();
            }
            ts.push(Token::In).space().lparen();
            for (i, value) in chunk.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.push(value.clone());
            }
            ts.rparen();
            ts
        })
        .collect();

    if chunks.len() == 1 {
        chunks.into_iter().next().unwrap_or_default()
    } else {
        let separator = if negated { Token::And } else { Token::Or };
        TokenStream::join_with(chunks, separator).parenthesized()
    }
}

/// Effective IN-list chunk size: the configured size capped by the dialect.
pub fn chunk_size(dialect: Dialect, configured: usize) -> usize {
    match dialect.in_list_limit() {
        Some(limit) => limit.min(configured).max(1),
        None => configured.max(1),
    }
}

/// `CASE WHEN column LIKE p THEN id ... END` computing an id per row.
pub fn like_case(column: &TokenStream, patterns: &[(String, String)], dialect: Dialect) -> TokenStream {
    let arms = patterns
        .iter()
        .map(|(pattern, id)| {
            (
                compare(column, Operator::Like, Token::LitString(pattern.clone())),
                TokenStream::from(Token::LitString(id.clone())),
            )
        })
        .collect();
    dialect.emit_case(arms)
}
