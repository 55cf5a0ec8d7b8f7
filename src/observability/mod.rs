//! # Observability
//!
//! Structured logging for migration runs.

pub mod logging;

pub use logging::{init_logging, log_config_info};
