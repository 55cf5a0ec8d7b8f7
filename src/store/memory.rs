//! In-memory secret store.
//!
//! Holds a key-value tree and a set of transit key backups in process memory.
//! Listing is derived from the stored paths, so directories appear exactly as
//! they would on a real endpoint. Failures can be injected per path and
//! optional latency makes concurrent access observable.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use super::client::{KeyBackup, SecretStore};
use super::error::{StoreResult, TransportError};

/// Process-local secret store.
#[derive(Debug)]
pub struct InMemorySecretStore {
    name: String,
    transit_mount: String,
    entries: RwLock<BTreeMap<String, Value>>,
    backups: RwLock<BTreeMap<String, KeyBackup>>,
    failures: RwLock<HashMap<String, usize>>,
    writes: RwLock<Vec<String>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemorySecretStore {
    /// Create an empty store. `name` only appears in error URLs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transit_mount: "transit".to_string(),
            entries: RwLock::new(BTreeMap::new()),
            backups: RwLock::new(BTreeMap::new()),
            failures: RwLock::new(HashMap::new()),
            writes: RwLock::new(Vec::new()),
            latency: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every operation by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed a key-value entry.
    pub async fn insert(&self, path: impl Into<String>, payload: Value) {
        self.entries.write().await.insert(path.into(), payload);
    }

    /// Seed a transit key with the given backup blob.
    ///
    /// The key's configuration starts out non-exportable, like a freshly
    /// created key.
    pub async fn insert_key(&self, name: impl Into<String>, backup: impl Into<String>) {
        let name = name.into();
        let config = json!({
            "name": name,
            "exportable": false,
            "allow_plaintext_backup": false,
        });
        self.entries.write().await.insert(self.key_path(&name), config);
        self.backups.write().await.insert(name.clone(), KeyBackup::new(name, backup));
    }

    /// Make the next `times` operations touching `path` fail with a 503.
    ///
    /// For transit keys use the key path (`<mount>/keys/<name>`).
    pub async fn fail_next(&self, path: impl Into<String>, times: usize) {
        self.failures.write().await.insert(path.into(), times);
    }

    /// Payload currently stored at `path`.
    pub async fn get(&self, path: &str) -> Option<Value> {
        self.entries.read().await.get(path).cloned()
    }

    /// Backup currently stored for key `name`.
    pub async fn get_backup(&self, name: &str) -> Option<KeyBackup> {
        self.backups.read().await.get(name).cloned()
    }

    /// Paths written so far, in order (key restores appear as their key path).
    pub async fn writes(&self) -> Vec<String> {
        self.writes.read().await.clone()
    }

    /// Highest number of operations observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn key_path(&self, name: &str) -> String {
        format!("{}/keys/{}", self.transit_mount, name)
    }

    fn url(&self, path: &str) -> String {
        format!("memory://{}/v1/{}", self.name, path)
    }

    async fn enter(&self, path: &str) -> StoreResult<OpGuard<'_>> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = OpGuard { counter: &self.in_flight };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut failures = self.failures.write().await;
        if let Some(remaining) = failures.get_mut(path) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::status(
                    self.url(path),
                    503,
                    json!({"errors": ["injected failure"]}),
                ));
            }
        }

        Ok(guard)
    }

    fn not_found(&self, path: &str) -> TransportError {
        TransportError::status(self.url(path), 404, json!({"errors": []}))
    }
}

struct OpGuard<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let _guard = self.enter(prefix).await?;
        let entries = self.entries.read().await;

        let children: BTreeSet<String> = entries
            .keys()
            .filter_map(|path| path.strip_prefix(prefix))
            .filter(|rest| !rest.is_empty())
            .map(|rest| match rest.find('/') {
                Some(idx) => rest[..=idx].to_string(),
                None => rest.to_string(),
            })
            .collect();

        Ok(children.into_iter().collect())
    }

    async fn read(&self, path: &str) -> StoreResult<Value> {
        let _guard = self.enter(path).await?;
        self.entries.read().await.get(path).cloned().ok_or_else(|| self.not_found(path))
    }

    async fn write(&self, path: &str, payload: &Value) -> StoreResult<()> {
        let _guard = self.enter(path).await?;
        self.entries.write().await.insert(path.to_string(), payload.clone());
        self.writes.write().await.push(path.to_string());
        Ok(())
    }

    async fn export_key_backup(&self, key_name: &str) -> StoreResult<KeyBackup> {
        let key_path = self.key_path(key_name);
        let _guard = self.enter(&key_path).await?;

        let exportable = self
            .entries
            .read()
            .await
            .get(&key_path)
            .and_then(|config| config.get("allow_plaintext_backup"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !exportable {
            return Err(TransportError::status(
                self.url(&format!("{}/backup/{}", self.transit_mount, key_name)),
                400,
                json!({"errors": ["plaintext backup is disallowed on the policy"]}),
            ));
        }

        let mut backup =
            self.backups.read().await.get(key_name).cloned().ok_or_else(|| self.not_found(&key_path))?;
        backup.name = key_name.to_string();
        Ok(backup)
    }

    async fn import_key_backup(&self, key_name: &str, backup: &KeyBackup) -> StoreResult<()> {
        let key_path = self.key_path(key_name);
        let _guard = self.enter(&key_path).await?;

        let config = json!({
            "name": key_name,
            "exportable": true,
            "allow_plaintext_backup": true,
        });
        self.entries.write().await.insert(key_path.clone(), config);
        self.backups
            .write()
            .await
            .insert(key_name.to_string(), KeyBackup::new(key_name, backup.backup.clone()));
        self.writes.write().await.push(key_path);
        Ok(())
    }

    async fn enable_export_and_backup(&self, key_path: &str) -> StoreResult<()> {
        let _guard = self.enter(key_path).await?;
        let mut entries = self.entries.write().await;
        let config = entries.get_mut(key_path).ok_or_else(|| self.not_found(key_path))?;
        if let Some(fields) = config.as_object_mut() {
            fields.insert("exportable".to_string(), Value::Bool(true));
            fields.insert("allow_plaintext_backup".to_string(), Value::Bool(true));
        }
        Ok(())
    }
}
