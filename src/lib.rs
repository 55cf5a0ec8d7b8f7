//! # Vault Migrator
//!
//! Copies secrets from one Vault endpoint to another and verifies the result.
//!
//! The source tree is walked from a set of root prefixes. Plain key-value
//! entries are read, written to the destination and read back; transit keys
//! are exported as backups, restored at the destination and re-exported from
//! both sides. Entries are compared after normalisation, so fields that
//! legitimately differ between two endpoints do not count as drift.
//!
//! ```text
//! TreeWalker → LeafProcessor → SecretStore (source, destination)
//!                   ↓
//!              FailureLog (SQLite)
//! ```
//!
//! Failed attempts are retried a bounded number of times and recorded in the
//! failure log; a failing leaf never stops the run. Failing to list a prefix
//! does.

pub mod cli;
pub mod compare;
pub mod config;
pub mod domain;
pub mod errors;
pub mod failure_log;
pub mod observability;
pub mod processor;
pub mod storage;
pub mod store;
pub mod walker;

pub use config::MigrationConfig;
pub use errors::{MigrationError, Result};
pub use processor::{LeafOutcome, LeafProcessor, RetryPolicy};
pub use walker::{RunSummary, TreeWalker, WalkerOptions};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
