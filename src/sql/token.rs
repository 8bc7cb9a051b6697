//! SQL Tokens - the atomic units of SQL output.
//!
//! Tokens are dialect-agnostic representations that serialize
//! to dialect-specific strings. Fragment builders produce token streams;
//! a statement is serialized once, for one dialect.

use crate::model::JoinType;

use super::dialect::{Dialect, SqlDialect};
use super::position::PositionFormat;

/// SQL Token - every element the statement builders emit.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    Distinct,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    On,
    In,
    Like,
    Case,
    When,
    Then,
    Else,
    End,
    OrderBy,
    Asc,
    Desc,
    Union,
    All,
    Null,

    // === DDL Keywords ===
    Create,
    Drop,
    Table,
    View,
    Index,
    Unique,
    Replace,

    // === Punctuation ===
    Comma,
    Dot,
    LParen,
    RParen,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,

    // === Whitespace ===
    Space,

    // === Dynamic Content ===
    /// Join keyword spelled per dialect.
    Join(JoinType),
    /// Simple identifier (column, alias, index name).
    Ident(String),
    /// Table reference, schema-qualified where the dialect allows it.
    TableRef { schema: String, name: String },
    /// `alias.column`
    ColumnRef { alias: String, column: String },
    LitInt(i64),
    LitFloat(f64),
    LitString(String),
    LitBool(bool),
    /// Epoch milliseconds rendered through a position format.
    Position { millis: i64, format: PositionFormat },

    // === Escape Hatch ===
    /// Raw SQL passed directly to output without escaping.
    ///
    /// Only for trusted, static fragments such as dialect-specific
    /// statistics calls. Values always go through the literal tokens.
    Raw(String),
}

impl Token {
    /// Serialize this token to a string for the given dialect.
    pub fn serialize(&self, dialect: Dialect) -> String {
        match self {
            Token::Select => "SELECT".into(),
            Token::Distinct => "DISTINCT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::Or => "OR".into(),
            Token::Not => "NOT".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::In => "IN".into(),
            Token::Like => "LIKE".into(),
            Token::Case => "CASE".into(),
            Token::When => "WHEN".into(),
            Token::Then => "THEN".into(),
            Token::Else => "ELSE".into(),
            Token::End => "END".into(),
            Token::OrderBy => "ORDER BY".into(),
            Token::Asc => "ASC".into(),
            Token::Desc => "DESC".into(),
            Token::Union => "UNION".into(),
            Token::All => "ALL".into(),
            Token::Null => "NULL".into(),

            Token::Create => "CREATE".into(),
            Token::Drop => "DROP".into(),
            Token::Table => "TABLE".into(),
            Token::View => "VIEW".into(),
            Token::Index => "INDEX".into(),
            Token::Unique => "UNIQUE".into(),
            Token::Replace => "REPLACE".into(),

            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            Token::Eq => "=".into(),
            Token::Ne => "<>".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Lte => "<=".into(),
            Token::Gte => ">=".into(),

            Token::Space => " ".into(),

            Token::Join(join_type) => dialect.join_keyword(*join_type).into(),
            Token::Ident(name) => dialect.render_identifier(name),
            Token::TableRef { schema, name } => {
                if dialect.qualifies_tables() {
                    format!(
                        "{}.{}",
                        dialect.render_identifier(schema),
                        dialect.render_identifier(name)
                    )
                } else {
                    dialect.render_identifier(name)
                }
            }
            Token::ColumnRef { alias, column } => {
                format!("{}.{}", alias, dialect.render_identifier(column))
            }
            Token::LitInt(n) => n.to_string(),
            Token::LitFloat(f) => {
                if f.is_finite() {
                    crate::model::value::format_number(*f)
                } else {
                    // Non-finite numbers have no SQL literal.
                    "NULL".into()
                }
            }
            Token::LitString(s) => dialect.quote_string(s),
            Token::LitBool(b) => dialect.format_bool(*b).into(),
            Token::Position { millis, format } => format.render(*millis, dialect),

            Token::Raw(s) => s.clone(),
        }
    }
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Extend with multiple tokens.
    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Serialize all tokens to a SQL string.
    pub fn serialize(&self, dialect: Dialect) -> String {
        self.tokens.iter().map(|t| t.serialize(dialect)).collect()
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
    pub fn column(&mut self, alias: &str, column: &str) -> &mut Self {
        self.push(Token::ColumnRef {
            alias: alias.to_string(),
            column: column.to_string(),
        })
    }

    /// Join `parts` with `separator` surrounded by spaces.
    pub fn join_with(parts: Vec<TokenStream>, separator: Token) -> TokenStream {
        let mut ts = TokenStream::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                ts.space().push(separator.clone()).space();
            }
            ts.append(part);
        }
        ts
    }

    /// Join `parts` with `, `.
    pub fn comma_separated(parts: Vec<TokenStream>) -> TokenStream {
        let mut ts = TokenStream::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.append(part);
        }
        ts
    }

    /// Wrap in parentheses.
    pub fn parenthesized(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.lparen().append(self).rparen();
        ts
    }
}

impl From<Token> for TokenStream {
    fn from(token: Token) -> Self {
        TokenStream {
            tokens: vec![token],
        }
    }
}
