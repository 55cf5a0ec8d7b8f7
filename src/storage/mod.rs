//! # Storage and Persistence
//!
//! SQLite connection handling for the failure log database.

pub mod pool;

pub use crate::config::DatabaseConfig;
pub use pool::{create_pool, get_pool_stats, DbPool, PoolStats};

use crate::errors::{MigrationError, Result};

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| MigrationError::Database {
        source: e,
        context: "Database connectivity check failed".to_string(),
    })?;

    Ok(())
}
