//! # Structured Logging
//!
//! Subscriber setup plus span macros used by the walker and the leaf
//! processor. Every line a leaf produces carries its path and kind through
//! the `leaf` span.

use crate::config::{LoggingConfig, MigrationConfig};
use crate::errors::{MigrationError, Result};
use tracing_subscriber::EnvFilter;

/// Create a tracing span for one leaf task.
///
/// ```rust,ignore
/// let span = leaf_span!(task.path, task.kind);
/// ```
#[macro_export]
macro_rules! leaf_span {
    ($path:expr, $kind:expr) => {
        tracing::info_span!("leaf", path = %$path, kind = %$kind)
    };
    ($path:expr, $kind:expr, $($field:tt)*) => {
        tracing::info_span!("leaf", path = %$path, kind = %$kind, $($field)*)
    };
}

/// Create a tracing span for the traversal of one root prefix.
#[macro_export]
macro_rules! prefix_span {
    ($prefix:expr) => {
        tracing::info_span!("prefix", root = %$prefix)
    };
}

/// Install the global subscriber.
///
/// A subscriber that is already installed (integration tests) is left alone.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| {
        MigrationError::config(format!("Invalid log level '{}': {}", config.level, e))
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let installed = if config.json {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };

    if installed.is_err() {
        // Subscriber already set elsewhere; ignore.
    }
    Ok(())
}

/// Log configuration at startup
pub fn log_config_info(config: &MigrationConfig) {
    tracing::info!(
        source = %config.source.address,
        destination = %config.destination.address,
        root_prefixes = ?config.root_prefixes,
        write_enabled = config.run.write_enabled,
        max_retry_count = config.run.max_retry_count,
        batch_width = config.run.batch_width,
        failure_db = %crate::storage::pool::sanitize_url(&config.database.url),
        "Vault migrator configuration"
    );
}
