//! Choosing the SQL dialect for a live connection.
//!
//! A [`GeneratorRegistry`] lists the candidate dialects in detection order.
//! [`GeneratorFactory::select`] opens a fresh connection per candidate and
//! returns the first dialect whose [`Compatibility`] matches, bound to the
//! mapping as a [`SqlGenerator`]. A forced dialect skips detection.

mod error;

pub use error::{GeneratorError, GeneratorResult};

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::config::Settings;
use crate::db::{ConnectionInfo, DataSource};
use crate::model::SchemaMapping;
use crate::sql::clause::TableRewrites;
use crate::sql::dialect::Compatibility;
use crate::sql::{Dialect, SqlDialect, SqlOptions, StatementFactory};

static MAJOR_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").unwrap());

/// Candidate dialects, in detection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorRegistry {
    dialects: Vec<Dialect>,
}

impl GeneratorRegistry {
    /// Every compiled-in dialect.
    pub fn builtin() -> Self {
        Self {
            dialects: Dialect::ALL.to_vec(),
        }
    }

    /// Dialects named in configuration; empty names mean [`builtin`](Self::builtin).
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> GeneratorResult<Self> {
        if names.is_empty() {
            return Ok(Self::builtin());
        }
        let mut dialects = Vec::with_capacity(names.len());
        for name in names {
            let dialect = name
                .as_ref()
                .parse::<Dialect>()
                .map_err(|e| GeneratorError::Discovery(e.to_string()))?;
            if !dialects.contains(&dialect) {
                dialects.push(dialect);
            }
        }
        Ok(Self { dialects })
    }

    pub fn dialects(&self) -> &[Dialect] {
        &self.dialects
    }
}

/// Leading number of a version string, e.g. `16` in `"16.2 (Debian)"`.
pub fn major_version(version: &str) -> Option<u32> {
    MAJOR_VERSION
        .captures(version)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Check `dialect` against what a connection reports.
pub fn check_compatibility(dialect: Dialect, info: &ConnectionInfo) -> GeneratorResult<()> {
    let Compatibility {
        product,
        min_major_version,
        driver,
    } = dialect.compatibility();
    let incompatible = |reason: String| GeneratorError::Incompatible { dialect, reason };

    if !info.product_name.to_ascii_lowercase().contains(product) {
        return Err(incompatible(format!(
            "product '{}' is not {}",
            info.product_name, product
        )));
    }
    match major_version(&info.product_version) {
        Some(major) if major >= min_major_version => {}
        _ => {
            return Err(incompatible(format!(
                "version '{}' is below {}",
                info.product_version, min_major_version
            )))
        }
    }
    if let Some(driver) = driver {
        if !info.driver_name.to_ascii_lowercase().contains(driver) {
            return Err(incompatible(format!(
                "driver '{}' is not a {} driver",
                info.driver_name, driver
            )));
        }
    }
    Ok(())
}

/// Selects a dialect for a data source.
#[derive(Debug, Clone)]
pub struct GeneratorFactory {
    registry: GeneratorRegistry,
    forced: Option<Dialect>,
    options: SqlOptions,
}

impl GeneratorFactory {
    pub fn new(registry: GeneratorRegistry, options: SqlOptions) -> Self {
        Self {
            registry,
            forced: None,
            options,
        }
    }

    /// Registry from `sql.generators`, forced dialect from `execution`.
    pub fn from_settings(settings: &Settings) -> GeneratorResult<Self> {
        let registry = GeneratorRegistry::from_names(&settings.sql.generators)?;
        let forced = settings
            .forced_dialect()
            .map_err(|e| GeneratorError::Discovery(e.to_string()))?;
        Ok(Self::new(registry, settings.sql.options()).forced(forced))
    }

    pub fn forced(mut self, dialect: Option<Dialect>) -> Self {
        self.forced = dialect;
        self
    }

    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    /// The forced dialect, or the first registered dialect compatible with
    /// `source`.
    pub async fn select(
        &self,
        source: &dyn DataSource,
        mapping: Arc<SchemaMapping>,
    ) -> GeneratorResult<SqlGenerator> {
        if let Some(dialect) = self.forced {
            info!(%dialect, "using forced dialect");
            return Ok(SqlGenerator::new(dialect, mapping, self.options.clone()));
        }

        let mut last_info: Option<ConnectionInfo> = None;
        for &dialect in self.registry.dialects() {
            if let Some(driver) = dialect.required_driver() {
                if let Err(e) = source.load_driver(driver) {
                    debug!(%dialect, error = %e, "required driver unavailable");
                    continue;
                }
            }

            // Fresh connection per candidate; dropped before the next one.
            let info = {
                let conn = source.connect(true).await?;
                conn.info().clone()
            };
            match check_compatibility(dialect, &info) {
                Ok(()) => {
                    info!(%dialect, product = %info.product_name, version = %info.product_version, "selected dialect");
                    return Ok(SqlGenerator::new(dialect, mapping, self.options.clone()));
                }
                Err(e) => debug!(error = %e, "dialect rejected"),
            }
            last_info = Some(info);
        }

        let (product, version) = last_info
            .map(|i| (i.product_name, i.product_version))
            .unwrap_or_else(|| ("unknown".to_string(), String::new()));
        Err(GeneratorError::NoCompatibleGenerator {
            product,
            version,
            tried: self
                .registry
                .dialects()
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

/// A dialect bound to a mapping and SQL options.
#[derive(Debug, Clone)]
pub struct SqlGenerator {
    dialect: Dialect,
    mapping: Arc<SchemaMapping>,
    options: SqlOptions,
}

impl SqlGenerator {
    pub fn new(dialect: Dialect, mapping: Arc<SchemaMapping>, options: SqlOptions) -> Self {
        Self {
            dialect,
            mapping,
            options,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn mapping(&self) -> &Arc<SchemaMapping> {
        &self.mapping
    }

    pub fn options(&self) -> &SqlOptions {
        &self.options
    }

    /// Statement factory reading through `rewrites`.
    pub fn statements<'a>(&'a self, rewrites: &'a TableRewrites) -> StatementFactory<'a> {
        StatementFactory::new(self.dialect, &self.options, rewrites)
    }
}
