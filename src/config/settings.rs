//! TOML-based configuration for strata.
//!
//! Supports a config file (strata.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [execution]
//! skip_execution = false
//! forced_dialect = "postgres"
//! fetch_size = 10000
//! query_timeout_secs = 0
//! workers = 4
//!
//! [retry]
//! attempts = 3
//! delay_ms = 3000
//!
//! [cache]
//! main_flush_rows = 1000000
//! reference_flush_rows = 2000000
//! persistent = false
//!
//! [sql]
//! in_list_chunk_size = 1000
//! prop_id_coverage = 0.85
//! max_prop_ids_in_clause = 2000
//! position_format = "raw"
//!
//! [source]
//! path = "${DATA_DIR}/ehr.sqlite"
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::{QueryOptions, RetryPolicy};
use crate::sql::{Dialect, PositionFormat, SqlOptions};

static ENV_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub execution: ExecutionSettings,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    pub sql: SqlSettings,
    pub source: SourceSettings,
}

/// How statements are run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Render and log statements without running them.
    pub skip_execution: bool,

    /// Dialect to use without inspecting the connection.
    pub forced_dialect: Option<String>,

    /// Rows fetched per round trip.
    pub fetch_size: usize,

    /// Per-statement timeout in seconds; 0 disables it.
    pub query_timeout_secs: u64,

    /// Entity groups read concurrently.
    pub workers: usize,

    /// Build staging tables for mappings that declare them.
    pub staging: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            skip_execution: false,
            forced_dialect: None,
            fetch_size: 10_000,
            query_timeout_secs: 0,
            workers: 4,
            staging: true,
        }
    }
}

/// Retry policy for failed statements.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 3_000,
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Propositions queued per entity before a flush.
    pub main_flush_rows: usize,

    /// Reference edges queued per reference before a flush.
    pub reference_flush_rows: usize,

    /// Keep propositions in an SQLite scratch file instead of memory. Each
    /// read gets its own file, removed when the read ends.
    pub persistent: bool,

    /// Where scratch files go. Defaults to the user cache directory.
    pub directory: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            main_flush_rows: 1_000_000,
            reference_flush_rows: 2_000_000,
            persistent: false,
            directory: None,
        }
    }
}

/// SQL generation settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SqlSettings {
    pub in_list_chunk_size: usize,
    pub prop_id_coverage: f64,
    pub max_prop_ids_in_clause: usize,
    pub position_format: PositionFormat,

    /// Dialects tried in order; empty means every compiled-in dialect.
    pub generators: Vec<String>,
}

impl Default for SqlSettings {
    fn default() -> Self {
        let options = SqlOptions::default();
        Self {
            in_list_chunk_size: options.in_list_chunk_size,
            prop_id_coverage: options.prop_id_coverage,
            max_prop_ids_in_clause: options.max_prop_ids_in_clause,
            position_format: options.position_format,
            generators: Vec::new(),
        }
    }
}

impl SqlSettings {
    pub fn options(&self) -> SqlOptions {
        SqlOptions {
            in_list_chunk_size: self.in_list_chunk_size,
            prop_id_coverage: self.prop_id_coverage,
            max_prop_ids_in_clause: self.max_prop_ids_in_clause,
            position_format: self.position_format,
        }
    }
}

/// The database read by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceSettings {
    /// SQLite database path (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl SourceSettings {
    /// Get the path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations, then apply
    /// environment overrides and validate.
    ///
    /// Searches in order:
    /// 1. Environment variable `STRATA_CONFIG`
    /// 2. `./strata.toml`
    /// 3. `~/.config/strata/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::locate()?;
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    fn locate() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("STRATA_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("strata.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("strata").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Apply `STRATA_SKIP_EXECUTION` and `STRATA_FORCED_DIALECT`.
    pub fn apply_env_overrides(&mut self) -> Result<(), SettingsError> {
        if let Ok(raw) = env::var("STRATA_SKIP_EXECUTION") {
            self.execution.skip_execution = parse_flag(&raw).ok_or_else(|| {
                SettingsError::InvalidConfig(format!("STRATA_SKIP_EXECUTION: '{}' is not a boolean", raw))
            })?;
        }
        if let Ok(raw) = env::var("STRATA_FORCED_DIALECT") {
            let raw = raw.trim();
            self.execution.forced_dialect = (!raw.is_empty()).then(|| raw.to_string());
        }
        Ok(())
    }

    /// Reject values no read could run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.forced_dialect()?;
        let checks = [
            (self.execution.workers == 0, "execution.workers must be at least 1"),
            (self.execution.fetch_size == 0, "execution.fetch_size must be at least 1"),
            (self.retry.attempts == 0, "retry.attempts must be at least 1"),
            (self.cache.main_flush_rows == 0, "cache.main_flush_rows must be at least 1"),
            (
                self.cache.reference_flush_rows == 0,
                "cache.reference_flush_rows must be at least 1",
            ),
            (self.sql.in_list_chunk_size == 0, "sql.in_list_chunk_size must be at least 1"),
            (
                !(self.sql.prop_id_coverage > 0.0 && self.sql.prop_id_coverage <= 1.0),
                "sql.prop_id_coverage must be in (0, 1]",
            ),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(SettingsError::InvalidConfig(message.to_string())),
            None => Ok(()),
        }
    }

    pub fn forced_dialect(&self) -> Result<Option<Dialect>, SettingsError> {
        self.execution
            .forced_dialect
            .as_deref()
            .map(|name| {
                name.parse::<Dialect>()
                    .map_err(|_| SettingsError::UnknownDialect(name.to_string()))
            })
            .transpose()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry.attempts,
            delay: Duration::from_millis(self.retry.delay_ms),
        }
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            fetch_size: self.execution.fetch_size,
            timeout: (self.execution.query_timeout_secs > 0)
                .then(|| Duration::from_secs(self.execution.query_timeout_secs)),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. A `$` not followed by a name is kept.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut last = 0;
    for caps in ENV_REFERENCE.captures_iter(s) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2))) else {
            continue;
        };
        let value =
            env::var(name.as_str()).map_err(|_| SettingsError::MissingEnvVar(name.as_str().to_string()))?;
        result.push_str(&s[last..whole.start()]);
        result.push_str(&value);
        last = whole.end();
    }
    result.push_str(&s[last..]);
    Ok(result)
}
