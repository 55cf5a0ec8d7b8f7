//! In-memory failure log.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{FailureLog, FailureRecord};
use crate::errors::Result;

/// Keeps records in a vector; used by tests and rehearsal runs.
#[derive(Debug, Default)]
pub struct MemoryFailureLog {
    records: Mutex<Vec<FailureRecord>>,
}

impl MemoryFailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records appended so far, in append order.
    pub async fn records(&self) -> Vec<FailureRecord> {
        self.records.lock().await.clone()
    }

    /// Records for a single path.
    pub async fn records_for(&self, path: &str) -> Vec<FailureRecord> {
        self.records.lock().await.iter().filter(|r| r.path == path).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl FailureLog for MemoryFailureLog {
    async fn append(&self, record: FailureRecord) -> Result<()> {
        self.records.lock().await.push(record);
        Ok(())
    }
}
