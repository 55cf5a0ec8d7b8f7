//! # Configuration Management
//!
//! Run configuration for the migrator. Everything is read from the
//! environment (a `.env` file is loaded first by the binary), validated, and
//! then handed to the walker and the leaf processor.

pub mod settings;

pub use settings::{
    DatabaseConfig, LoggingConfig, MigrationConfig, RunConfig, StoreConfig, DEFAULT_BATCH_WIDTH,
    DEFAULT_MAX_RETRY_COUNT, DEFAULT_ROOT_PREFIXES,
};
