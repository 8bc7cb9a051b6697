//! T-SQL (SQL Server) dialect.
//!
//! T-SQL has significant differences from ANSI:
//! - Square bracket identifier quoting (`[name]`)
//! - No native boolean in SELECT; 1/0 literals
//! - N'...' prefix for Unicode strings
//! - `INNER JOIN` spelled out
//! - `CAST(... AS DATETIME2)` for timestamp literals
//! - `UPDATE STATISTICS` instead of ANALYZE
//! - No CREATE OR REPLACE VIEW
//! - `SELECT ... INTO` instead of CREATE TABLE AS

use super::helpers;
use super::{Compatibility, SqlDialect};
use crate::model::JoinType;
use crate::sql::token::{Token, TokenStream};

/// T-SQL (SQL Server) dialect.
#[derive(Debug, Clone, Copy)]
pub struct TSql;

impl SqlDialect for TSql {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_bracket(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        // N'...' keeps non-ASCII codes intact in NVARCHAR comparisons
        if !s.is_ascii() {
            helpers::quote_string_unicode(s)
        } else {
            helpers::quote_string_single(s)
        }
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn join_keyword(&self, join_type: JoinType) -> &'static str {
        match join_type {
            JoinType::Inner => "INNER JOIN",
            JoinType::LeftOuter => "LEFT OUTER JOIN",
        }
    }

    fn format_timestamp_literal(&self, text: &str) -> String {
        format!("CAST('{}' AS DATETIME2)", text)
    }

    fn emit_gather_statistics(&self, schema: &str, table: &str) -> TokenStream {
        helpers::emit_statistics_keyword("UPDATE STATISTICS", schema, table)
    }

    fn emit_create_table_as(&self, table: Token, query: &TokenStream) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Select)
            .space()
            .push(Token::Raw("*".into()))
            .space()
            .push(Token::Raw("INTO".into()))
            .space()
            .push(table)
            .space()
            .push(Token::From)
            .space()
            .append(&query.parenthesized())
            .space()
            .push(Token::Raw("staged".into()));
        ts
    }

    fn supports_create_or_replace_view(&self) -> bool {
        // Use DROP + CREATE instead
        false
    }

    fn compatibility(&self) -> Compatibility {
        Compatibility {
            product: "microsoft sql server",
            min_major_version: 9,
            driver: Some("tds"),
        }
    }
}
