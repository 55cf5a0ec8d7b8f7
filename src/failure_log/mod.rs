//! Failure log.
//!
//! Append-only record of every failed processing attempt. The migrator never
//! reads it back; it exists so an operator can see which paths failed, how
//! many times, and why, after the run has finished.
//!
//! Records are written concurrently from many leaf tasks, so implementations
//! must accept interleaved appends.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{LeafTask, RecordKind};
use crate::errors::{MigrationError, Result};

pub use memory::MemoryFailureLog;
pub use sqlite::SqliteFailureLog;

/// One failed attempt at processing a leaf.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub kind: RecordKind,
    pub path: String,
    pub message: String,
    pub message_info: Value,
    pub created_on: DateTime<Utc>,
}

impl FailureRecord {
    /// Record for attempt number `attempt` of `task` failing with `error`.
    pub fn attempt_failed(task: &LeafTask, attempt: u32, error: &MigrationError) -> Self {
        Self {
            kind: task.record_kind(),
            path: task.path.clone(),
            message: attempt_message(attempt),
            message_info: error.details(),
            created_on: Utc::now(),
        }
    }
}

/// `message` column value for a failed attempt.
pub fn attempt_message(attempt: u32) -> String {
    format!("FAILED_PROCESSING_{}_TIME", attempt)
}

/// Append-only sink for failure records.
#[async_trait]
pub trait FailureLog: Send + Sync {
    /// Persist one record.
    async fn append(&self, record: FailureRecord) -> Result<()>;
}
