//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features:
//! - ANSI identifier quoting (`"`)
//! - Lowercase case folding for unquoted identifiers
//! - Native boolean type (true/false)
//! - `AS` accepted before table aliases
//! - `ANALYZE` for statistics

use super::helpers;
use super::{Compatibility, SqlDialect};
use crate::sql::token::TokenStream;

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn table_alias_keyword(&self) -> Option<&'static str> {
        Some("AS")
    }

    fn emit_gather_statistics(&self, schema: &str, table: &str) -> TokenStream {
        helpers::emit_statistics_keyword("ANALYZE", schema, table)
    }

    fn max_identifier_length(&self) -> usize {
        63
    }

    fn compatibility(&self) -> Compatibility {
        Compatibility {
            product: "postgresql",
            min_major_version: 8,
            driver: None,
        }
    }
}
