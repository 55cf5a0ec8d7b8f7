//! SQLite-backed failure log.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{FailureLog, FailureRecord};
use crate::errors::{MigrationError, Result};
use crate::storage::DbPool;

const CREATE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS error_log (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    key_type              TEXT,
    key_path              TEXT,
    message               TEXT,
    message_info          TEXT,
    created_on            TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_on            TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

/// Failure log stored in the `error_log` table.
#[derive(Debug, Clone)]
pub struct SqliteFailureLog {
    pool: DbPool,
}

impl SqliteFailureLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open the log, creating the table if it does not exist yet.
    pub async fn open(pool: DbPool) -> Result<Self> {
        let log = Self::new(pool);
        log.ensure_table().await?;
        Ok(log)
    }

    /// Create the `error_log` table if absent.
    pub async fn ensure_table(&self) -> Result<()> {
        info!("Creating error log table");
        sqlx::query(CREATE_TABLE).execute(&self.pool).await.map_err(|e| {
            MigrationError::Database {
                source: e,
                context: "Failed to create error_log table".to_string(),
            }
        })?;
        info!("Error log table ready");
        Ok(())
    }
}

#[async_trait]
impl FailureLog for SqliteFailureLog {
    async fn append(&self, record: FailureRecord) -> Result<()> {
        let message_info = serde_json::to_string(&record.message_info)?;

        sqlx::query(
            "INSERT INTO error_log (key_type, key_path, message, message_info, created_on, updated_on) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.kind.as_str())
        .bind(&record.path)
        .bind(&record.message)
        .bind(message_info)
        .bind(record.created_on)
        .bind(record.created_on)
        .execute(&self.pool)
        .await
        .map_err(|e| MigrationError::Database {
            source: e,
            context: format!("Failed to record failure for '{}'", record.path),
        })?;

        debug!(path = %record.path, message = %record.message, "Failure recorded");
        Ok(())
    }
}
