//! Dialect selection errors.

use thiserror::Error;

use crate::db::DbError;
use crate::sql::Dialect;

#[derive(Error, Debug)]
pub enum GeneratorError {
    /// The connection does not match what the dialect needs.
    #[error("{dialect} is not compatible: {reason}")]
    Incompatible { dialect: Dialect, reason: String },

    /// Every registered dialect was tried and rejected.
    #[error("no compatible SQL generator for {product} {version} (tried: {tried})")]
    NoCompatibleGenerator {
        product: String,
        version: String,
        tried: String,
    },

    /// The registry could not be built.
    #[error("generator discovery failed: {0}")]
    Discovery(String),

    /// A detection connection could not be opened.
    #[error("dialect detection failed: {0}")]
    Detection(#[from] DbError),
}

pub type GeneratorResult<T> = Result<T, GeneratorError>;
