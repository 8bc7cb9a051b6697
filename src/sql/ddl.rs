//! DDL (Data Definition Language) support for staging areas.
//!
//! Builders for the statements a staging pass issues: a table populated from
//! a query, its indexes and statistics, the union view over the per-entity
//! tables, and the drops that undo all of it.
//!
//! # Examples
//!
//! ```ignore
//! use strata::sql::ddl::CreateIndex;
//! use strata::sql::Dialect;
//!
//! let index = CreateIndex::new("labs_stage_1_pk", "stage", "labs_stage_1")
//!     .unique()
//!     .column("lab_id");
//!
//! println!("{}", index.to_sql(Dialect::Postgres));
//! ```

use sha2::{Digest, Sha256};

use super::dialect::{Dialect, SqlDialect};
use super::token::{Token, TokenStream};

fn table_ref(schema: &str, name: &str) -> Token {
    Token::TableRef {
        schema: schema.to_string(),
        name: name.to_string(),
    }
}

// ============================================================================
// CREATE TABLE AS
// ============================================================================

/// Table created and populated from a query.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateTableAs {
    pub schema: String,
    pub name: String,
    pub query: TokenStream,
}

impl CreateTableAs {
    pub fn new(schema: impl Into<String>, name: impl Into<String>, query: TokenStream) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            query,
        }
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        dialect.emit_create_table_as(table_ref(&self.schema, &self.name), &self.query)
    }
}

// ============================================================================
// CREATE INDEX
// ============================================================================

/// CREATE [UNIQUE] INDEX statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateIndex {
    pub unique: bool,
    pub name: String,
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
}

impl CreateIndex {
    /// Create a new CREATE INDEX statement.
    pub fn new(name: impl Into<String>, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            unique: false,
            name: name.into(),
            schema: schema.into(),
            table: table.into(),
            columns: Vec::new(),
        }
    }

    /// Make this a unique index.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Add a column to the index.
    pub fn column(mut self, col: impl Into<String>) -> Self {
        self.columns.push(col.into());
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, _dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Create);
        if self.unique {
            ts.space().push(Token::Unique);
        }
        ts.space()
            .push(Token::Index)
            .space()
            .push(Token::Ident(self.name.clone()))
            .space()
            .push(Token::On)
            .space()
            .push(table_ref(&self.schema, &self.table))
            .space();
        emit_column_list(&mut ts, &self.columns);

        ts
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Refresh optimizer statistics for a freshly populated table.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct GatherStatistics {
    pub schema: String,
    pub table: String,
}

impl GatherStatistics {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        dialect.emit_gather_statistics(&self.schema, &self.table)
    }
}

// ============================================================================
// CREATE VIEW ... UNION ALL
// ============================================================================

/// View merging tables of identical shape.
///
/// ```ignore
/// // Postgres:
/// // CREATE OR REPLACE VIEW stage.labs AS
/// //   SELECT lab_id, keyid FROM stage.labs_1 UNION ALL SELECT lab_id, keyid FROM stage.labs_2
/// ```
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateUnionView {
    pub or_replace: bool,
    pub schema: String,
    pub name: String,
    pub columns: Vec<String>,
    /// `(schema, table)` of every merged table.
    pub tables: Vec<(String, String)>,
}

impl CreateUnionView {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            or_replace: false,
            schema: schema.into(),
            name: name.into(),
            columns: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Add OR REPLACE clause.
    ///
    /// Not supported by T-SQL; dropped silently there.
    pub fn or_replace(mut self) -> Self {
        self.or_replace = true;
        self
    }

    pub fn columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = cols.into_iter().map(|c| c.into()).collect();
        self
    }

    pub fn table(mut self, schema: impl Into<String>, table: impl Into<String>) -> Self {
        self.tables.push((schema.into(), table.into()));
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Create);
        if self.or_replace && dialect.supports_create_or_replace_view() {
            ts.space().push(Token::Or).space().push(Token::Replace);
        }
        ts.space()
            .push(Token::View)
            .space()
            .push(table_ref(&self.schema, &self.name))
            .space()
            .push(Token::As)
            .space();

        let selects = self
            .tables
            .iter()
            .map(|(schema, table)| {
                let mut select = TokenStream::new();
                select.push(Token::Select).space();
                let cols = self
                    .columns
                    .iter()
                    .map(|c| TokenStream::from(Token::Ident(c.clone())))
                    .collect();
                select
                    .append(&TokenStream::comma_separated(cols))
                    .space()
                    .push(Token::From)
                    .space()
                    .push(table_ref(schema, table));
                select
            })
            .collect::<Vec<_>>();

        let mut union = TokenStream::new();
        union.push(Token::Union).space().push(Token::All);
        for (i, select) in selects.iter().enumerate() {
            if i > 0 {
                ts.space().append(&union).space();
            }
            ts.append(select);
        }

        ts
    }
}

// ============================================================================
// DROP TABLE / DROP VIEW
// ============================================================================

/// DROP TABLE statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct DropTable {
    pub schema: String,
    pub name: String,
}

impl DropTable {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, _dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Drop)
            .space()
            .push(Token::Table)
            .space()
            .push(table_ref(&self.schema, &self.name));
        ts
    }
}

/// DROP VIEW statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct DropView {
    pub schema: String,
    pub name: String,
}

impl DropView {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, _dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Drop)
            .space()
            .push(Token::View)
            .space()
            .push(table_ref(&self.schema, &self.name));
        ts
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn emit_column_list(ts: &mut TokenStream, columns: &[String]) {
    ts.lparen();
    let mut first = true;
    for col in columns {
        if !first {
            ts.comma().space();
        }
        first = false;
        ts.push(Token::Ident(col.clone()));
    }
    ts.rparen();
}

/// Generated object name `<base>_<suffix>`, kept within the dialect's
/// identifier limit by replacing the tail with a short content hash.
pub fn object_name(dialect: Dialect, base: &str, suffix: &str) -> String {
    let name = format!("{}_{}", base, suffix);
    let max = dialect.max_identifier_length();
    if name.len() <= max {
        return name;
    }

    let digest = Sha256::digest(name.as_bytes());
    let hash: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();
    // `<head>_<hash8>_<suffix>`, head cut on a char boundary
    let reserved = hash.len() + suffix.len() + 2;
    let mut head_len = max.saturating_sub(reserved);
    while head_len > 0 && !base.is_char_boundary(head_len) {
        head_len -= 1;
    }
    let head = &base[..head_len.min(base.len())];
    let shortened = format!("{}_{}_{}", head, hash, suffix);
    if shortened.len() <= max {
        shortened
    } else {
        // Suffix alone exceeds the limit
        hash
    }
}

// ============================================================================
// Tests
// ============================================================================
