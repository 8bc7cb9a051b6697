use crate::model::Order;
use crate::sql::alias::TableAliases;
use crate::sql::info::ColumnSpecInfo;
use crate::sql::token::{Token, TokenStream};

use super::where_clause::column;

/// `ORDER BY start [, finish]` for the primary target; empty without a start.
///
/// The finish column is only added when the entity declares one of its own.
pub fn build_order_by(info: &ColumnSpecInfo<'_>, aliases: &TableAliases, order: Order) -> TokenStream {
    let primary = info.primary();
    let Some(start) = primary.start else {
        return TokenStream::new();
    };

    let direction = match order {
        Order::Ascending => Token::Asc,
        Order::Descending => Token::Desc,
    };

    let mut keys = Vec::with_capacity(2);
    for node in std::iter::once(start).chain(
        primary
            .finish
            .filter(|_| primary.spec.finish_spec.is_some()),
    ) {
        let mut key = column(info, aliases, node);
        key.space().push(direction.clone());
        keys.push(key);
    }

    let mut ts = TokenStream::new();
    ts.push(Token::OrderBy)
        .space()
        .append(&TokenStream::comma_separated(keys));
    ts
}
