//! # Tree Walker
//!
//! Drives traversal of the secret tree. Root prefixes are visited in order
//! from a worklist; directories found while listing a prefix are appended to
//! the worklist and visited later in the same run. Leaves are dispatched to
//! the [`LeafProcessor`] as concurrent tasks, capped at the batch width. When
//! the cap is reached every outstanding task is awaited before anything else
//! is dispatched.
//!
//! Listing failures are not caught here and abort the run.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info, warn, Instrument};

use crate::domain::{is_directory, join_path, LeafTask};
use crate::errors::Result;
use crate::processor::{LeafOutcome, LeafProcessor};
use crate::store::SecretStore;

/// Traversal settings
#[derive(Debug, Clone)]
pub struct WalkerOptions {
    pub batch_width: usize,
    pub progress_interval: usize,
    pub transit_mount: String,
}

impl Default for WalkerOptions {
    fn default() -> Self {
        Self {
            batch_width: crate::config::DEFAULT_BATCH_WIDTH,
            progress_interval: 2000,
            transit_mount: "transit".to_string(),
        }
    }
}

/// Tally for one prefix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefixSummary {
    pub prefix: String,
    /// Entries returned by the source listing
    pub total: usize,
    /// Skipped because the destination already has them (write mode only)
    pub existing: usize,
    /// Sub-directories appended to the worklist
    pub directories: usize,
    /// Leaves handed to the processor
    pub dispatched: usize,
}

/// Result of awaiting every in-flight task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub settled: usize,
    pub done: usize,
    pub abandoned: usize,
}

/// Everything a run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub prefixes: Vec<PrefixSummary>,
    pub batches: Vec<BatchReport>,
}

impl RunSummary {
    pub fn dispatched(&self) -> usize {
        self.prefixes.iter().map(|p| p.dispatched).sum()
    }

    pub fn existing(&self) -> usize {
        self.prefixes.iter().map(|p| p.existing).sum()
    }

    pub fn done(&self) -> usize {
        self.batches.iter().map(|b| b.done).sum()
    }

    pub fn abandoned(&self) -> usize {
        self.batches.iter().map(|b| b.abandoned).sum()
    }

    /// Summary for `prefix`, if it was visited.
    pub fn prefix(&self, prefix: &str) -> Option<&PrefixSummary> {
        self.prefixes.iter().find(|p| p.prefix == prefix)
    }
}

pub struct TreeWalker {
    source: Arc<dyn SecretStore>,
    destination: Arc<dyn SecretStore>,
    processor: LeafProcessor,
    options: WalkerOptions,
}

impl TreeWalker {
    pub fn new(
        source: Arc<dyn SecretStore>,
        destination: Arc<dyn SecretStore>,
        processor: LeafProcessor,
        options: WalkerOptions,
    ) -> Self {
        Self { source, destination, processor, options }
    }

    /// Visit every root prefix and everything discovered beneath them.
    pub async fn run(&self, roots: &[String]) -> Result<RunSummary> {
        let mut worklist: VecDeque<String> = roots.iter().cloned().collect();
        let mut summary = RunSummary::default();

        while let Some(prefix) = worklist.pop_front() {
            let span = crate::prefix_span!(prefix);
            self.walk_prefix(&prefix, &mut worklist, &mut summary).instrument(span).await?;
        }

        Ok(summary)
    }

    async fn walk_prefix(
        &self,
        prefix: &str,
        worklist: &mut VecDeque<String>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let names = self.source.list(prefix).await?;
        info!(number_of_keys = names.len(), "Starting migration for root");

        let present: HashSet<String> = self.destination.list(prefix).await?.into_iter().collect();
        let write_enabled = self.processor.write_enabled();
        let interval = self.options.progress_interval.max(1);
        let width = self.options.batch_width.max(1);

        let mut tally = PrefixSummary { prefix: prefix.to_string(), total: names.len(), ..Default::default() };
        let mut in_flight: JoinSet<LeafOutcome> = JoinSet::new();

        for (index, name) in names.iter().enumerate() {
            if index % interval == 0 {
                info!(completed = index, total = names.len(), "Progress");
            }

            if write_enabled && present.contains(name) {
                tally.existing += 1;
                continue;
            }

            if is_directory(name) {
                worklist.push_back(join_path(prefix, name));
                tally.directories += 1;
                continue;
            }

            let task = LeafTask::new(prefix, name, &self.options.transit_mount);
            let processor = self.processor.clone();
            in_flight.spawn(async move { processor.process(&task).await });
            tally.dispatched += 1;

            if in_flight.len() >= width {
                summary.batches.push(drain(&mut in_flight).await);
            }
        }

        if !in_flight.is_empty() {
            summary.batches.push(drain(&mut in_flight).await);
        }

        info!(
            total = tally.total,
            existing = tally.existing,
            added = tally.total - tally.existing,
            directories = tally.directories,
            dispatched = tally.dispatched,
            "Completed processing for root"
        );
        summary.prefixes.push(tally);
        Ok(())
    }
}

/// Await every task in `in_flight`.
async fn drain(in_flight: &mut JoinSet<LeafOutcome>) -> BatchReport {
    let mut report = BatchReport::default();

    while let Some(joined) = in_flight.join_next().await {
        report.settled += 1;
        match joined {
            Ok(outcome) if outcome.is_abandoned() => report.abandoned += 1,
            Ok(_) => report.done += 1,
            Err(join_err) => {
                error!(error = %join_err, "Leaf task terminated unexpectedly");
                report.abandoned += 1;
            }
        }
    }

    if report.abandoned > 0 {
        warn!(abandoned = report.abandoned, settled = report.settled, "Failed : {}/{}", report.abandoned, report.settled);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure_log::{FailureLog, MemoryFailureLog};
    use crate::processor::RetryPolicy;
    use crate::store::InMemorySecretStore;
    use serde_json::json;
    use std::time::Duration;

    fn walker(
        source: &Arc<InMemorySecretStore>,
        destination: &Arc<InMemorySecretStore>,
        log: &Arc<MemoryFailureLog>,
        write_enabled: bool,
        batch_width: usize,
    ) -> TreeWalker {
        let log: Arc<dyn FailureLog> = log.clone();
        let processor = LeafProcessor::new(
            source.clone(),
            destination.clone(),
            log,
            write_enabled,
            RetryPolicy::new(2, Duration::ZERO),
        );
        let options = WalkerOptions { batch_width, ..Default::default() };
        TreeWalker::new(source.clone(), destination.clone(), processor, options)
    }

    fn stores() -> (Arc<InMemorySecretStore>, Arc<InMemorySecretStore>, Arc<MemoryFailureLog>) {
        (
            Arc::new(InMemorySecretStore::new("source")),
            Arc::new(InMemorySecretStore::new("destination")),
            Arc::new(MemoryFailureLog::new()),
        )
    }

    fn roots(prefixes: &[&str]) -> Vec<String> {
        prefixes.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_verify_mode_dispatches_everything() {
        let (source, destination, log) = stores();
        source.insert("A/x", json!({"v": 1})).await;
        source.insert("A/y", json!({"v": 2})).await;
        destination.insert("A/x", json!({"v": 1})).await;

        let summary = walker(&source, &destination, &log, false, 80).run(&roots(&["A/"])).await.unwrap();

        let prefix = summary.prefix("A/").unwrap();
        assert_eq!(prefix.total, 2);
        assert_eq!(prefix.existing, 0);
        assert_eq!(prefix.dispatched, 2);
        assert_eq!(summary.abandoned(), 1);
        assert_eq!(summary.done(), 1);

        let records = log.records().await;
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.path == "A/y"));
        assert_eq!(records[0].message, "FAILED_PROCESSING_1_TIME");
        assert!(destination.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_write_mode_copies_missing_leaf() {
        let (source, destination, log) = stores();
        source.insert("A/x", json!({"v": 1})).await;
        source.insert("A/y", json!({"v": 2})).await;
        destination.insert("A/x", json!({"v": 1})).await;

        let summary = walker(&source, &destination, &log, true, 80).run(&roots(&["A/"])).await.unwrap();

        let prefix = summary.prefix("A/").unwrap();
        assert_eq!(prefix.existing, 1);
        assert_eq!(prefix.dispatched, 1);
        assert_eq!(destination.get("A/y").await, Some(json!({"v": 2})));
        assert_eq!(destination.writes().await, vec!["A/y"]);
        assert!(log.is_empty().await);
    }

    #[tokio::test]
    async fn test_second_write_run_reprocesses_nothing() {
        let (source, destination, log) = stores();
        for i in 0..5 {
            source.insert(format!("kv/issuers/i{}", i), json!({"i": i})).await;
        }
        source.insert("kv/issuers/sub/leaf", json!({"deep": true})).await;
        let roots = roots(&["kv/issuers/"]);

        let first = walker(&source, &destination, &log, true, 80).run(&roots).await.unwrap();
        assert_eq!(first.dispatched(), 6);

        let second = walker(&source, &destination, &log, true, 80).run(&roots).await.unwrap();
        assert_eq!(second.dispatched(), 0);
        assert_eq!(second.existing(), 6);
        assert_eq!(destination.writes().await.len(), 6);
    }

    #[tokio::test]
    async fn test_directories_are_queued_once_and_never_dispatched() {
        let (source, destination, log) = stores();
        source.insert("kv/holders/h1", json!({"h": 1})).await;
        source.insert("kv/holders/team/h2", json!({"h": 2})).await;
        source.insert("kv/holders/team/h3", json!({"h": 3})).await;
        source.insert("kv/holders/team/deep/h4", json!({"h": 4})).await;

        let summary =
            walker(&source, &destination, &log, true, 80).run(&roots(&["kv/holders/"])).await.unwrap();

        let visited: Vec<_> = summary.prefixes.iter().map(|p| p.prefix.as_str()).collect();
        assert_eq!(visited, vec!["kv/holders/", "kv/holders/team/", "kv/holders/team/deep/"]);
        assert_eq!(summary.prefix("kv/holders/").unwrap().directories, 1);
        assert_eq!(summary.prefix("kv/holders/").unwrap().dispatched, 1);
        assert_eq!(summary.dispatched(), 4);
        assert!(destination.get("kv/holders/team/deep/h4").await.is_some());
        assert!(log.is_empty().await);
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_batch_width() {
        let source = Arc::new(InMemorySecretStore::new("source").with_latency(Duration::from_millis(5)));
        let destination = Arc::new(InMemorySecretStore::new("destination"));
        let log = Arc::new(MemoryFailureLog::new());
        for i in 0..23 {
            source.insert(format!("kv/issuers/k{:02}", i), json!({"i": i})).await;
        }

        let summary =
            walker(&source, &destination, &log, true, 5).run(&roots(&["kv/issuers/"])).await.unwrap();

        assert!(source.max_in_flight() <= 5);
        assert_eq!(summary.batches.len(), 5);
        assert!(summary.batches[..4].iter().all(|b| b.settled == 5));
        assert_eq!(summary.batches[4].settled, 3);
        assert_eq!(summary.done(), 23);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_run() {
        let (source, destination, log) = stores();
        source.insert("kv/issuers/a", json!({})).await;
        destination.fail_next("kv/issuers/", 1).await;

        let result = walker(&source, &destination, &log, false, 80).run(&roots(&["kv/issuers/"])).await;

        let err = result.unwrap_err();
        assert!(err.is_transport());
        assert!(log.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_prefix_is_not_an_error() {
        let (source, destination, log) = stores();

        let summary =
            walker(&source, &destination, &log, false, 80).run(&roots(&["transit/keys/"])).await.unwrap();

        assert_eq!(summary.prefix("transit/keys/").unwrap().total, 0);
        assert!(summary.batches.is_empty());
    }

    #[tokio::test]
    async fn test_transit_keys_classified_by_mount() {
        let (source, destination, log) = stores();
        let blob = {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .encode(json!({"policy": {"name": "k"}}).to_string())
        };
        source.insert_key("k", blob).await;

        let summary =
            walker(&source, &destination, &log, true, 80).run(&roots(&["transit/keys/"])).await.unwrap();

        assert_eq!(summary.done(), 1);
        assert!(destination.get_backup("k").await.is_some());
    }
}
