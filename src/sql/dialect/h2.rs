//! H2 SQL dialect.
//!
//! H2 follows PostgreSQL conventions closely:
//! - ANSI identifier quoting (`"`)
//! - Native boolean type (true/false)
//! - `AS` accepted before table aliases

use super::helpers;
use super::{Compatibility, SqlDialect};

/// H2 SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct H2;

impl SqlDialect for H2 {
    fn name(&self) -> &'static str {
        "h2"
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

    fn max_identifier_length(&self) -> usize {
        256
    }

    fn compatibility(&self) -> Compatibility {
        Compatibility {
            product: "h2",
            min_major_version: 1,
            driver: None,
        }
    }
}
