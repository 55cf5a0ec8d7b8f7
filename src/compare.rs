//! Normalised comparison of source and destination payloads.
//!
//! Plain key-value payloads are compared on their canonical serialisation:
//! object keys are sorted recursively so field order never matters, and
//! every field is significant.
//!
//! Transit key backups are base64 blobs wrapping a JSON document. Some policy
//! fields are rewritten by the destination when a key is restored (restore
//! bookkeeping, import provenance, rotation settings), so they are removed
//! from both sides before comparing. Everything else, key material
//! included, must match exactly.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{Map, Value};

use crate::errors::{MigrationError, Result};
use crate::store::KeyBackup;

/// Policy fields that legitimately differ between two instances of a key.
pub const EXCLUDED_POLICY_FIELDS: [&str; 5] =
    ["AllowImportedKeyRotation", "auto_rotate_period", "Imported", "restore_info", "backup_info"];

/// Outcome of comparing two payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Canonical form of the source payload
    pub source: String,
    /// Canonical form of the destination payload
    pub destination: String,
}

impl Comparison {
    fn of(source: &Value, destination: &Value) -> Self {
        Self { source: canonical_string(source), destination: canonical_string(destination) }
    }

    pub fn matches(&self) -> bool {
        self.source == self.destination
    }
}

/// Rebuild `value` with every object's keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical serialisation used for equality.
pub fn canonical_string(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// Compare two key-value payloads.
pub fn compare_kv(source: &Value, destination: &Value) -> Comparison {
    Comparison::of(source, destination)
}

/// Decode a backup blob and strip the destination-local policy fields.
pub fn normalize_backup(backup: &KeyBackup) -> Result<Value> {
    let bytes = STANDARD
        .decode(backup.backup.trim())
        .map_err(|e| MigrationError::decode(&backup.name, format!("invalid base64: {}", e)))?;
    let mut document: Value = serde_json::from_slice(&bytes)
        .map_err(|e| MigrationError::decode(&backup.name, format!("invalid JSON: {}", e)))?;

    let policy = document
        .get_mut("policy")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| MigrationError::decode(&backup.name, "backup has no policy object"))?;
    for field in EXCLUDED_POLICY_FIELDS {
        policy.remove(field);
    }

    Ok(document)
}

/// Compare two transit key backups after normalisation.
pub fn compare_key_backups(source: &KeyBackup, destination: &KeyBackup) -> Result<Comparison> {
    let source = normalize_backup(source)?;
    let destination = normalize_backup(destination)?;
    Ok(Comparison::of(&source, &destination))
}
