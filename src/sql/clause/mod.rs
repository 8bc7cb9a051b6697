//! Clause builders.
//!
//! Every builder reads a [`ColumnSpecInfo`](super::info::ColumnSpecInfo) and
//! its [`TableAliases`](super::alias::TableAliases) and returns a
//! [`TokenStream`](super::token::TokenStream) fragment.

pub mod from;
pub mod order_by;
pub mod predicate;
pub mod select;
pub mod where_clause;

use super::SqlOptions;

pub use from::{build_from, TableRewrites};
pub use order_by::build_order_by;
pub use select::{main_columns, reference_columns, PropIdSource, ReferenceLayout, SelectLayout};
pub use where_clause::{build_where, EntityFilters};

/// Shared settings for WHERE rendering.
#[derive(Debug, Clone, Copy)]
pub struct WhereContext<'o> {
    pub options: &'o SqlOptions,
    /// IN-list chunk size already capped by the dialect.
    pub chunk_size: usize,
}
