//! Errors surfaced by a read.

use thiserror::Error;

use crate::cache::CacheError;
use crate::config::SettingsError;
use crate::db::ExecutionError;
use crate::generator::GeneratorError;
use crate::model::MappingError;
use crate::sql::SqlGenError;
use crate::staging::StagingError;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("schema modeling error: {0}")]
    Sql(#[from] SqlGenError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("result cache: {0}")]
    Cache(#[from] CacheError),
}

impl ReadError {
    /// Whether the read stopped because it was cancelled or ran past its
    /// deadline.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ReadError::Execution(e) if e.is_cancellation())
    }
}
