//! Schema mapping model.
//!
//! - [`column`] - column paths, joins, constraints and code maps
//! - [`entity`] - entity specs with their properties and references
//! - [`filter`] - request filters
//! - [`mapping`] - the loaded, validated mapping
//! - [`proposition`] - propositions built from result rows
//! - [`staging`] - staging declarations
//! - [`value`] - typed values

pub mod column;
pub mod entity;
pub mod filter;
pub mod mapping;
pub mod proposition;
pub mod staging;
pub mod value;

pub use column::{ColumnSpec, JoinSpec, JoinType, Operator};
pub use entity::{
    Cardinality, EntityKind, EntitySpec, PartitionUnit, PropertySpec, ReferenceSpec, ValueDecoder,
};
pub use filter::{Filter, FilterSet, PositionFilter, PropertyValueFilter, Side, ValueComparator};
pub use mapping::{MappingError, SchemaMapping};
pub use proposition::{Interval, Order, Proposition, UniqueId};
pub use staging::{StagedColumn, StagingSpec, TableRef};
pub use value::{InequalityComparator, Value, ValueType};
