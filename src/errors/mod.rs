//! # Error Handling
//!
//! Crate-wide error type for the migrator, built on `thiserror`.
//!
//! Store-level failures are carried as [`TransportError`] so that their
//! classification (error status, no response, request never sent) survives
//! all the way to the failure log.

use serde_json::{json, Value};

use crate::store::TransportError;

/// Custom result type for migrator operations
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Main error type for the migrator
#[derive(thiserror::Error, Debug)]
pub enum MigrationError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Secret store request failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Source and destination payloads differ after normalisation
    #[error("{kind} verification failed for path: {path}")]
    VerificationMismatch { kind: String, path: String },

    /// Backup blob could not be decoded
    #[error("Failed to decode backup for '{path}': {message}")]
    Decode { path: String, message: String },

    /// Failure log persistence errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MigrationError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a verification mismatch error
    pub fn mismatch<K: Into<String>, P: Into<String>>(kind: K, path: P) -> Self {
        Self::VerificationMismatch { kind: kind.into(), path: path.into() }
    }

    /// Create a decode error
    pub fn decode<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::Decode { path: path.into(), message: message.into() }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Structured detail written to the failure log's `message_info` column.
    ///
    /// Transport failures keep their classification; everything else is
    /// reduced to a `message` field.
    pub fn details(&self) -> Value {
        match self {
            Self::Transport(err) => err.details(),
            other => json!({ "message": other.to_string() }),
        }
    }

    /// Whether this error came from a store call rather than a comparison
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<validator::ValidationErrors> for MigrationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages = Vec::new();
        collect_validation_messages("", &errors, &mut messages);
        messages.sort();

        Self::validation(format!("Validation failed: {}", messages.join("; ")))
    }
}

/// Flatten nested validation errors into `path: message` entries.
fn collect_validation_messages(
    prefix: &str,
    errors: &validator::ValidationErrors,
    messages: &mut Vec<String>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path =
            if prefix.is_empty() { field.to_string() } else { format!("{}.{}", prefix, field) };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or_else(|| e.code.to_string(), |m| m.to_string()))
                    .collect();
                messages.push(format!("{}: {}", path, error_messages.join(", ")));
            }
            ValidationErrorsKind::Struct(nested) => {
                collect_validation_messages(&path, nested, messages);
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_validation_messages(&format!("{}[{}]", path, index), nested, messages);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = MigrationError::config("missing source address");
        assert!(matches!(error, MigrationError::Config(_)));
        assert_eq!(error.to_string(), "Configuration error: missing source address");
    }

    #[test]
    fn test_validation_field() {
        let error = MigrationError::validation_field("must not be empty", "source.address");
        if let MigrationError::Validation { field, .. } = error {
            assert_eq!(field, Some("source.address".to_string()));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_mismatch_message() {
        let error = MigrationError::mismatch("KV", "kv/issuers/abc");
        assert_eq!(error.to_string(), "KV verification failed for path: kv/issuers/abc");
        assert!(!error.is_transport());
        assert_eq!(
            error.details(),
            json!({ "message": "KV verification failed for path: kv/issuers/abc" })
        );
    }

    #[test]
    fn test_transport_details_preserved() {
        let error: MigrationError = TransportError::NoResponse {
            url: "https://vault.local/v1/kv/x".to_string(),
            message: "connection refused".to_string(),
        }
        .into();

        assert!(error.is_transport());
        let details = error.details();
        assert_eq!(details["request_url"], "https://vault.local/v1/kv/x");
        assert_eq!(details["error_request"], "connection refused");
    }

    #[test]
    fn test_serialization_conversion() {
        let json_error = serde_json::from_str::<Value>("not json").unwrap_err();
        let error: MigrationError = json_error.into();
        assert!(matches!(error, MigrationError::Serialization(_)));
    }
}
