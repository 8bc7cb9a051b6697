//! Structured logging.
//!
//! Console output through `tracing-subscriber`, filtered by `STRATA_LOG`
//! (an `EnvFilter` directive such as `strata=debug`), defaulting to `info`.
//! Logs go to stderr so JSON printed by the CLI stays clean.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "STRATA_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber once; later calls are no-ops.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let directive = log_directive();
        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_filter(filter),
        );

        // Embedding applications may already have installed one.
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }

        tracing::debug!(directive = %directive, "logging initialized");
    });
}

fn log_directive() -> String {
    std::env::var(LOG_ENV)
        .ok()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}
