//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use super::super::token::{Token, TokenStream};

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: Oracle, Postgres, H2, SQLite
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: MySQL
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote identifier with square brackets.
/// Used by: T-SQL
pub fn quote_bracket(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
/// Used by: All dialects
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote string with N prefix for Unicode (T-SQL).
/// Used by: T-SQL for non-ASCII strings
pub fn quote_string_unicode(s: &str) -> String {
    format!("N'{}'", s.replace('\'', "''"))
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as literal true/false.
/// Used by: Postgres, H2
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Format boolean as numeric 1/0.
/// Used by: Oracle, T-SQL, MySQL, SQLite
pub fn format_bool_numeric(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// `<keyword> schema.table` statistics statement.
/// Used by: Postgres (`ANALYZE`), T-SQL (`UPDATE STATISTICS`)
pub fn emit_statistics_keyword(keyword: &str, schema: &str, table: &str) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Raw(keyword.to_string()))
        .space()
        .push(Token::TableRef {
            schema: schema.to_string(),
            name: table.to_string(),
        });
    ts
}
