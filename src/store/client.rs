//! Core secret store trait and types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::StoreResult;

/// An exported transit key backup.
///
/// `backup` is the base64 blob returned by the store; `name` is the key name
/// it was exported under and is what the restore endpoint expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBackup {
    #[serde(default)]
    pub name: String,
    pub backup: String,
}

impl KeyBackup {
    pub fn new(name: impl Into<String>, backup: impl Into<String>) -> Self {
        Self { name: name.into(), backup: backup.into() }
    }
}

/// Operations against one secret store endpoint.
///
/// Paths are relative to the store's API root (for example
/// `kv/issuers/acme` or `transit/keys/signing`). Every method is a single
/// request; none of them retry.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// List the children of `prefix`.
    ///
    /// Directory entries end with `/`. A prefix with no children yields an
    /// empty list rather than an error.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Read the payload stored at `path`.
    async fn read(&self, path: &str) -> StoreResult<Value>;

    /// Write `payload` at `path`, overwriting whatever is there.
    async fn write(&self, path: &str, payload: &Value) -> StoreResult<()>;

    /// Export the backup blob of the transit key `key_name`.
    async fn export_key_backup(&self, key_name: &str) -> StoreResult<KeyBackup>;

    /// Restore a transit key from a previously exported backup.
    ///
    /// Overwrites the key if it already exists.
    async fn import_key_backup(&self, key_name: &str, backup: &KeyBackup) -> StoreResult<()>;

    /// Allow the key at `key_path` to be exported and backed up.
    ///
    /// Must be called on the source before [`SecretStore::export_key_backup`].
    async fn enable_export_and_backup(&self, key_path: &str) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_backup_deserialize_without_name() {
        let backup: KeyBackup = serde_json::from_str(r#"{"backup":"ZXhwb3J0ZWQ="}"#).unwrap();
        assert_eq!(backup.name, "");
        assert_eq!(backup.backup, "ZXhwb3J0ZWQ=");
    }
}
