//! Configuration module for strata.
//!
//! Handles the settings file, environment overrides and variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, CacheSettings, ExecutionSettings, RetrySettings, Settings, SettingsError,
    SourceSettings, SqlSettings,
};
