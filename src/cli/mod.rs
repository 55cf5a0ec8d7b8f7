//! # Command Line Interface
//!
//! Parses arguments, selects the run mode and wires configuration, the
//! failure log, both store clients and the walker together.

use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info};

use crate::config::{LoggingConfig, MigrationConfig};
use crate::failure_log::{FailureLog, SqliteFailureLog};
use crate::observability::{init_logging, log_config_info};
use crate::processor::{LeafProcessor, RetryPolicy};
use crate::storage::{check_connection, create_pool, get_pool_stats};
use crate::store::{HttpSecretStore, SecretStore};
use crate::walker::{RunSummary, TreeWalker, WalkerOptions};

#[derive(Parser, Debug)]
#[command(name = "vault-migrator")]
#[command(about = "Copy and verify secrets and transit keys between two Vault endpoints")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// `write` copies missing entries; anything else only verifies
    pub mode: Option<String>,

    /// Failure log database URL override
    #[arg(long)]
    pub failure_db_url: Option<String>,

    /// Root prefix override (repeatable)
    #[arg(long = "root")]
    pub roots: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Whether the destination is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Write,
    Verify,
}

impl RunMode {
    /// Only the literal `write` enables writing.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some("write") => Self::Write,
            _ => Self::Verify,
        }
    }

    pub fn write_enabled(&self) -> bool {
        matches!(self, Self::Write)
    }
}

impl Cli {
    pub fn run_mode(&self) -> RunMode {
        RunMode::from_arg(self.mode.as_deref())
    }

    /// Apply command line overrides on top of the environment configuration.
    pub fn apply(&self, config: &mut MigrationConfig) -> crate::errors::Result<()> {
        config.run.write_enabled = self.run_mode().write_enabled();
        if let Some(url) = &self.failure_db_url {
            config.database.url = url.clone();
        }
        if !self.roots.is_empty() {
            config.root_prefixes = self.roots.clone();
        }
        config.validate()
    }
}

/// Execute one migration run.
pub async fn run_cli(cli: Cli) -> anyhow::Result<RunSummary> {
    let mut logging = LoggingConfig::from_env()?;
    if cli.verbose && std::env::var("MIGRATOR_LOG_LEVEL").is_err() && std::env::var("RUST_LOG").is_err()
    {
        logging.level = "debug".to_string();
    }
    init_logging(&logging)?;

    let mut config = MigrationConfig::from_env()?;
    config.logging = logging;
    cli.apply(&mut config)?;
    log_config_info(&config);

    if config.run.write_enabled {
        info!("Starting processing, writing is enabled. This operation will write keys in destination");
    } else {
        info!("Starting processing, writing is disabled. This operation will verify keys in destination");
    }

    let pool = create_pool(&config.database).await?;
    check_connection(&pool).await?;
    let failure_log: Arc<dyn FailureLog> = Arc::new(SqliteFailureLog::open(pool.clone()).await?);

    let source: Arc<dyn SecretStore> = Arc::new(HttpSecretStore::new(config.source_endpoint())?);
    let destination: Arc<dyn SecretStore> =
        Arc::new(HttpSecretStore::new(config.destination_endpoint())?);

    let processor = LeafProcessor::new(
        source.clone(),
        destination.clone(),
        failure_log,
        config.run.write_enabled,
        RetryPolicy::from(&config.run),
    );
    let options = WalkerOptions {
        batch_width: config.run.batch_width,
        progress_interval: config.run.progress_interval,
        transit_mount: config.transit_mount.clone(),
    };
    let walker = TreeWalker::new(source, destination, processor, options);

    let summary = walker.run(&config.root_prefixes).await?;
    info!(
        prefixes = summary.prefixes.len(),
        dispatched = summary.dispatched(),
        existing = summary.existing(),
        done = summary.done(),
        abandoned = summary.abandoned(),
        "Migration run finished"
    );

    let stats = get_pool_stats(&pool);
    debug!(size = stats.size, active = stats.active(), "Failure log pool");
    Ok(summary)
}
