//! # Leaf Processor
//!
//! Copies (when writing is enabled) and verifies one leaf. Every failure is
//! appended to the failure log and retried after a fixed backoff until the
//! retry bound is exhausted, at which point the leaf is abandoned. Nothing
//! raised while processing a leaf ever reaches the scheduler.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn, Instrument};

use crate::compare::{compare_key_backups, compare_kv};
use crate::config::RunConfig;
use crate::domain::{LeafKind, LeafTask};
use crate::errors::{MigrationError, Result};
use crate::failure_log::{FailureLog, FailureRecord};
use crate::store::SecretStore;

/// Retry bound and backoff for one leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retry_count: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retry_count: u32, backoff: Duration) -> Self {
        Self { max_retry_count, backoff }
    }

    /// Whether failed attempt number `attempt` was the last one allowed.
    fn exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_retry_count
    }
}

impl From<&RunConfig> for RetryPolicy {
    fn from(config: &RunConfig) -> Self {
        Self::new(config.max_retry_count, config.retry_backoff())
    }
}

/// Terminal state of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafOutcome {
    Done { attempts: u32 },
    Abandoned { attempts: u32 },
}

impl LeafOutcome {
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned { .. })
    }
}

/// Processes leaves against a source and destination store.
///
/// Cheap to clone; every dispatched task owns a clone.
#[derive(Clone)]
pub struct LeafProcessor {
    source: Arc<dyn SecretStore>,
    destination: Arc<dyn SecretStore>,
    failure_log: Arc<dyn FailureLog>,
    write_enabled: bool,
    retry: RetryPolicy,
}

impl LeafProcessor {
    pub fn new(
        source: Arc<dyn SecretStore>,
        destination: Arc<dyn SecretStore>,
        failure_log: Arc<dyn FailureLog>,
        write_enabled: bool,
        retry: RetryPolicy,
    ) -> Self {
        Self { source, destination, failure_log, write_enabled, retry }
    }

    pub fn write_enabled(&self) -> bool {
        self.write_enabled
    }

    /// Process `task` to completion or abandonment.
    pub async fn process(&self, task: &LeafTask) -> LeafOutcome {
        let span = crate::leaf_span!(task.path, task.kind);
        self.process_with_retry(task).instrument(span).await
    }

    async fn process_with_retry(&self, task: &LeafTask) -> LeafOutcome {
        let mut attempt = 1;
        loop {
            match self.run_once(task).await {
                Ok(()) => {
                    debug!(attempt, "Leaf verified");
                    return LeafOutcome::Done { attempts: attempt };
                }
                Err(err) => {
                    self.report_failure(task, attempt, &err).await;
                    if self.retry.exhausted(attempt) {
                        warn!(attempts = attempt, "Abandoning leaf after exhausting retries");
                        return LeafOutcome::Abandoned { attempts: attempt };
                    }
                    tokio::time::sleep(self.retry.backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One pass through read, write, re-read and compare.
    async fn run_once(&self, task: &LeafTask) -> Result<()> {
        match task.kind {
            LeafKind::PlainKv => self.copy_kv(task).await,
            LeafKind::EncryptionKey => self.copy_key(task).await,
        }
    }

    async fn copy_kv(&self, task: &LeafTask) -> Result<()> {
        let payload = self.source.read(&task.path).await?;
        if self.write_enabled {
            self.destination.write(&task.path, &payload).await?;
        }

        let copied = self.destination.read(&task.path).await?;
        if !compare_kv(&payload, &copied).matches() {
            return Err(MigrationError::mismatch(task.kind.as_str(), &task.path));
        }
        Ok(())
    }

    async fn copy_key(&self, task: &LeafTask) -> Result<()> {
        self.source.enable_export_and_backup(&task.path).await?;

        if self.write_enabled {
            let backup = self.source.export_key_backup(&task.name).await?;
            self.destination.import_key_backup(&task.name, &backup).await?;
        }

        let source = self.source.export_key_backup(&task.name).await?;
        let destination = self.destination.export_key_backup(&task.name).await?;
        if !compare_key_backups(&source, &destination)?.matches() {
            return Err(MigrationError::mismatch(task.kind.as_str(), &task.path));
        }
        Ok(())
    }

    async fn report_failure(&self, task: &LeafTask, attempt: u32, err: &MigrationError) {
        match err {
            MigrationError::Transport(transport) => warn!(
                attempt,
                classification = transport.classification(),
                url = transport.url(),
                status = ?transport.status_code(),
                error = %transport,
                "Leaf attempt failed"
            ),
            other => warn!(attempt, error = %other, "Leaf attempt failed"),
        }

        let record = FailureRecord::attempt_failed(task, attempt, err);
        if let Err(log_err) = self.failure_log.append(record).await {
            error!(attempt, error = %log_err, "Failed to append failure record");
        }
    }
}
