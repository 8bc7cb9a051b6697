//! Oracle SQL dialect.
//!
//! Oracle differences from ANSI:
//! - No `AS` between a table and its alias
//! - At most 1,000 elements per `IN (...)` list
//! - 30 character identifiers (pre-12.2)
//! - No boolean SQL type; 1/0 literals
//! - `TO_TIMESTAMP` for timestamp literals
//! - Statistics through `DBMS_STATS`

use super::helpers;
use super::{Compatibility, SqlDialect};
use crate::sql::token::{Token, TokenStream};

/// Oracle SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Oracle;

impl SqlDialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn in_list_limit(&self) -> Option<usize> {
        Some(1000)
    }

    fn format_timestamp_literal(&self, text: &str) -> String {
        let format = if text.contains('.') {
            "YYYY-MM-DD HH24:MI:SS.FF3"
        } else {
            "YYYY-MM-DD HH24:MI:SS"
        };
        format!("TO_TIMESTAMP('{}', '{}')", text, format)
    }

    fn emit_gather_statistics(&self, schema: &str, table: &str) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Raw(format!(
            "BEGIN DBMS_STATS.GATHER_TABLE_STATS({}, {}); END;",
            helpers::quote_string_single(schema),
            helpers::quote_string_single(table)
        )));
        ts
    }

    fn max_identifier_length(&self) -> usize {
        30
    }

    fn compatibility(&self) -> Compatibility {
        Compatibility {
            product: "oracle",
            min_major_version: 10,
            driver: Some("oracle"),
        }
    }
}
