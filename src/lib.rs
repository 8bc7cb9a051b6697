//! # Strata
//!
//! Compiles declarative entity-to-table mappings into multi-dialect SQL and
//! streams the results into a bounded proposition cache.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              SchemaMapping (TOML / JSON)                 │
//! │  (entity specs, column paths, references, staging)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [generator]
//! ┌─────────────────────────────────────────────────────────┐
//! │        SqlGenerator (dialect detected or forced)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [staging, sql]
//! ┌─────────────────────────────────────────────────────────┐
//! │      Staging DDL, main and reference statements          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [db, processor]
//! ┌─────────────────────────────────────────────────────────┐
//! │      Rows -> Propositions -> ResultCache                 │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [reader]
//! ┌─────────────────────────────────────────────────────────┐
//! │          key id -> ordered propositions                  │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod db;
pub mod generator;
pub mod logging;
pub mod model;
pub mod processor;
pub mod reader;
pub mod sql;
pub mod staging;

// Re-export SQL submodules at crate level
pub use sql::ddl;
pub use sql::dialect;
pub use sql::token;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::db::{Cancellation, DataSource, SqliteDataSource};
    pub use crate::dialect::{Dialect, SqlDialect};
    pub use crate::generator::{GeneratorFactory, SqlGenerator};
    pub use crate::model::{
        ColumnSpec, EntityKind, EntitySpec, FilterSet, Interval, Order, PositionFilter,
        Proposition, SchemaMapping, Side, UniqueId, Value, ValueType,
    };
    pub use crate::reader::{PropositionReader, ReadError};
    pub use crate::sql::{QueryRequest, SqlOptions};
    pub use crate::token::{Token, TokenStream};
}

// Also export at crate root for convenience
pub use dialect::Dialect;
pub use model::{Proposition, SchemaMapping};
pub use reader::{PropositionReader, ReadError};
