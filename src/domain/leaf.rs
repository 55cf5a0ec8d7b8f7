//! Leaf classification.
//!
//! A listing entry is either a directory (name ends with `/`) that must be
//! listed in turn, or a leaf. Leaves are one of two kinds, decided purely by
//! the shape of their path: anything under the transit mount is an
//! encryption key, everything else is a plain key-value secret.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between path segments; a trailing separator marks a directory.
pub const SEPARATOR: char = '/';

/// Whether a listing entry names a directory.
pub fn is_directory(name: &str) -> bool {
    name.ends_with(SEPARATOR)
}

/// Resolve a listing entry against the prefix it was listed under.
pub fn join_path(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name)
}

/// How a leaf is copied and compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafKind {
    /// Opaque JSON mapping of fields to values
    PlainKv,
    /// Named transit key moved as a backup blob
    EncryptionKey,
}

impl LeafKind {
    /// Classify `path` given the transit engine's mount segment.
    pub fn classify(path: &str, transit_mount: &str) -> Self {
        if path.split(SEPARATOR).any(|segment| segment == transit_mount) {
            Self::EncryptionKey
        } else {
            Self::PlainKv
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainKv => "KV",
            Self::EncryptionKey => "Transit",
        }
    }
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `key_type` column value of a failure record.
///
/// Plain key-value leaves are split by registry: holder entries live under a
/// `holders` segment, everything else is filed as an issuer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    Issuer,
    Holder,
    Transit,
}

impl RecordKind {
    pub fn for_leaf(kind: LeafKind, path: &str) -> Self {
        match kind {
            LeafKind::EncryptionKey => Self::Transit,
            LeafKind::PlainKv if path.split(SEPARATOR).any(|s| s == "holders") => Self::Holder,
            LeafKind::PlainKv => Self::Issuer,
        }
    }

    /// Get the database representation of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issuer => "ISSUER",
            Self::Holder => "HOLDER",
            Self::Transit => "TRANSIT",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One leaf to copy and verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafTask {
    /// Fully-qualified path (prefix + name)
    pub path: String,
    /// Name as it appeared in the listing; the transit key name for keys
    pub name: String,
    pub kind: LeafKind,
}

impl LeafTask {
    pub fn new(prefix: &str, name: &str, transit_mount: &str) -> Self {
        let path = join_path(prefix, name);
        let kind = LeafKind::classify(&path, transit_mount);
        Self { path, name: name.to_string(), kind }
    }

    pub fn record_kind(&self) -> RecordKind {
        RecordKind::for_leaf(self.kind, &self.path)
    }
}
