//! SQLite SQL dialect.
//!
//! SQLite differences from ANSI:
//! - Tables are not schema-qualified (schemas are attached databases)
//! - `JOIN` / `LEFT JOIN` spellings
//! - Timestamps are plain text literals
//! - `ANALYZE table` without the TABLE keyword
//! - No `CREATE OR REPLACE VIEW`

use super::helpers;
use super::{Compatibility, SqlDialect};
use crate::model::JoinType;
use crate::sql::token::{Token, TokenStream};

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn join_keyword(&self, join_type: JoinType) -> &'static str {
        match join_type {
            JoinType::Inner => "JOIN",
            JoinType::LeftOuter => "LEFT JOIN",
        }
    }

    fn qualifies_tables(&self) -> bool {
        false
    }

    fn format_timestamp_literal(&self, text: &str) -> String {
        helpers::quote_string_single(text)
    }

    fn emit_gather_statistics(&self, schema: &str, table: &str) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Raw("ANALYZE".into()))
            .space()
            .push(Token::TableRef {
                schema: schema.to_string(),
                name: table.to_string(),
            });
        ts
    }

    fn max_identifier_length(&self) -> usize {
        1024
    }

    fn supports_create_or_replace_view(&self) -> bool {
        false
    }

    fn compatibility(&self) -> Compatibility {
        Compatibility {
            product: "sqlite",
            min_major_version: 3,
            driver: None,
        }
    }
}
