//! MySQL SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting (`` `name` ``)
//! - Boolean is TINYINT(1), returns 1/0
//! - `INNER JOIN` / `LEFT JOIN` spellings
//! - `TIMESTAMP(...)` function for timestamp literals
//! - 64 character identifiers

use super::helpers;
use super::{Compatibility, SqlDialect};
use crate::model::JoinType;

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn join_keyword(&self, join_type: JoinType) -> &'static str {
        match join_type {
            JoinType::Inner => "INNER JOIN",
            JoinType::LeftOuter => "LEFT JOIN",
        }
    }

    fn format_timestamp_literal(&self, text: &str) -> String {
        format!("TIMESTAMP('{}')", text)
    }

    // Uses default emit_gather_statistics (ANALYZE TABLE ...)

    fn max_identifier_length(&self) -> usize {
        64
    }

    fn compatibility(&self) -> Compatibility {
        Compatibility {
            product: "mysql",
            min_major_version: 5,
            driver: None,
        }
    }
}
