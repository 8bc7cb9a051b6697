//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` (Oracle/PG/H2/SQLite), `` ` `` (MySQL), `[]` (T-SQL)
//! - Join keywords: `JOIN` vs `INNER JOIN`, `LEFT OUTER JOIN` vs `LEFT JOIN`
//! - Table qualification and the table alias keyword
//! - Boolean literals: true/false vs 1/0
//! - Timestamp literals and statistics gathering
//! - IN-list and identifier length limits
//!
//! # Usage
//!
//! ```ignore
//! use strata::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Oracle;
//! assert_eq!(dialect.in_list_limit(), Some(1000));
//! ```
//!
//! # Compatibility
//!
//! | Dialect | Product | Minimum major version | Driver |
//! |---------|---------|-----------------------|--------|
//! | Oracle | Oracle | 10 | oracle |
//! | Postgres | PostgreSQL | 8 | - |
//! | TSql | Microsoft SQL Server | 9 | tds |
//! | MySql | MySQL | 5 | - |
//! | H2 | H2 | 1 | - |
//! | Sqlite | SQLite | 3 | - |

mod h2;
pub mod helpers;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;
mod tsql;

pub use h2::H2;
pub use mysql::MySql;
pub use oracle::Oracle;
pub use postgres::Postgres;
pub use sqlite::Sqlite;
pub use tsql::TSql;

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::JoinType;

use super::token::{Token, TokenStream};

static SIMPLE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").unwrap());

/// What a live connection must report for a dialect to be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compatibility {
    /// Case-insensitive substring of the product name.
    pub product: &'static str,
    pub min_major_version: u32,
    /// Case-insensitive substring of the driver name, when one is required.
    pub driver: Option<&'static str>,
}

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    ///
    /// - Oracle/PostgreSQL/H2/SQLite: `"identifier"`
    /// - MySQL: `` `identifier` ``
    /// - T-SQL: `[identifier]`
    fn quote_identifier(&self, ident: &str) -> String;

    /// Render an identifier, quoting it only when it is not a plain name.
    ///
    /// Plain names stay unquoted so each database applies its own case folding.
    fn render_identifier(&self, ident: &str) -> String {
        if SIMPLE_IDENTIFIER.is_match(ident) {
            ident.to_string()
        } else {
            self.quote_identifier(ident)
        }
    }

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    ///
    /// - PostgreSQL/H2: `true`/`false`
    /// - Oracle/MySQL/T-SQL/SQLite: `1`/`0`
    fn format_bool(&self, b: bool) -> &'static str;

    // =========================================================================
    // FROM clause
    // =========================================================================

    /// Keyword introducing a join.
    fn join_keyword(&self, join_type: JoinType) -> &'static str {
        match join_type {
            JoinType::Inner => "JOIN",
            JoinType::LeftOuter => "LEFT OUTER JOIN",
        }
    }

    /// Whether table references carry their schema.
    fn qualifies_tables(&self) -> bool {
        true
    }

    /// Keyword placed between a table reference and its alias, if any.
    ///
    /// Oracle rejects `AS` before a table alias, so the default is none.
    fn table_alias_keyword(&self) -> Option<&'static str> {
        None
    }

    // =========================================================================
    // WHERE clause
    // =========================================================================

    /// Maximum number of elements in one `IN (...)` list.
    fn in_list_limit(&self) -> Option<usize> {
        None
    }

    /// Emit a searched CASE computing one of `arms` (condition, result).
    fn emit_case(&self, arms: Vec<(TokenStream, TokenStream)>) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Case);
        for (condition, result) in arms {
            ts.space()
                .push(Token::When)
                .space()
                .append(&condition)
                .space()
                .push(Token::Then)
                .space()
                .append(&result);
        }
        ts.space().push(Token::End);
        ts
    }

    // =========================================================================
    // Date/Time
    // =========================================================================

    /// Native timestamp literal for `yyyy-MM-dd HH:mm:ss[.SSS]` text.
    fn format_timestamp_literal(&self, text: &str) -> String {
        format!("TIMESTAMP '{}'", text)
    }

    // =========================================================================
    // DDL Support
    // =========================================================================

    /// Statement refreshing optimizer statistics for a table.
    fn emit_gather_statistics(&self, schema: &str, table: &str) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Raw("ANALYZE TABLE".into()))
            .space()
            .push(Token::TableRef {
                schema: schema.to_string(),
                name: table.to_string(),
            });
        ts
    }

    /// Populate a new table from a query.
    ///
    /// Default: `CREATE TABLE <table> AS <query>`.
    fn emit_create_table_as(&self, table: Token, query: &TokenStream) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Create)
            .space()
            .push(Token::Table)
            .space()
            .push(table)
            .space()
            .push(Token::As)
            .space()
            .append(query);
        ts
    }

    /// Longest identifier accepted for generated object names.
    fn max_identifier_length(&self) -> usize {
        128
    }

    /// Whether this dialect supports CREATE OR REPLACE VIEW.
    fn supports_create_or_replace_view(&self) -> bool {
        true
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Product, version and driver requirements checked against a connection.
    fn compatibility(&self) -> Compatibility;

    /// Driver that must be loaded before a connection is attempted.
    fn required_driver(&self) -> Option<&'static str> {
        self.compatibility().driver
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    #[serde(rename = "oracle")]
    Oracle,
    #[serde(rename = "postgres", alias = "postgresql")]
    Postgres,
    #[serde(rename = "tsql", alias = "sqlserver", alias = "mssql")]
    TSql,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "h2")]
    H2,
    #[serde(rename = "sqlite")]
    Sqlite,
}

impl Dialect {
    /// Every compiled-in dialect, in default detection order.
    pub const ALL: [Dialect; 6] = [
        Dialect::Oracle,
        Dialect::Postgres,
        Dialect::TSql,
        Dialect::MySql,
        Dialect::H2,
        Dialect::Sqlite,
    ];

    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Oracle => &Oracle,
            Dialect::Postgres => &Postgres,
            Dialect::TSql => &TSql,
            Dialect::MySql => &MySql,
            Dialect::H2 => &H2,
            Dialect::Sqlite => &Sqlite,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn render_identifier(&self, ident: &str) -> String {
        self.dialect().render_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn join_keyword(&self, join_type: JoinType) -> &'static str {
        self.dialect().join_keyword(join_type)
    }

    fn qualifies_tables(&self) -> bool {
        self.dialect().qualifies_tables()
    }

    fn table_alias_keyword(&self) -> Option<&'static str> {
        self.dialect().table_alias_keyword()
    }

    fn in_list_limit(&self) -> Option<usize> {
        self.dialect().in_list_limit()
    }

    fn emit_case(&self, arms: Vec<(TokenStream, TokenStream)>) -> TokenStream {
        self.dialect().emit_case(arms)
    }

    fn format_timestamp_literal(&self, text: &str) -> String {
        self.dialect().format_timestamp_literal(text)
    }

    fn emit_gather_statistics(&self, schema: &str, table: &str) -> TokenStream {
        self.dialect().emit_gather_statistics(schema, table)
    }

    fn emit_create_table_as(&self, table: Token, query: &TokenStream) -> TokenStream {
        self.dialect().emit_create_table_as(table, query)
    }

    fn max_identifier_length(&self) -> usize {
        self.dialect().max_identifier_length()
    }

    fn supports_create_or_replace_view(&self) -> bool {
        self.dialect().supports_create_or_replace_view()
    }

    fn compatibility(&self) -> Compatibility {
        self.dialect().compatibility()
    }

    fn required_driver(&self) -> Option<&'static str> {
        self.dialect().required_driver()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

/// Unknown dialect name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown dialect '{0}'. Expected one of: oracle, postgres, tsql, mysql, h2, sqlite")]
pub struct UnknownDialect(pub String);

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oracle" => Ok(Dialect::Oracle),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "tsql" | "sqlserver" | "mssql" => Ok(Dialect::TSql),
            "mysql" => Ok(Dialect::MySql),
            "h2" => Ok(Dialect::H2),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}
