//! Error types for secret store requests.

use serde_json::{json, Value};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, TransportError>;

/// A failed store request, classified by how far it got.
///
/// Every variant carries the URL that was targeted so a failure record can
/// point an operator at the exact endpoint.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("Request to {url} failed with status {status}")]
    Status { url: String, status: u16, body: Value },

    /// The request was sent but no response arrived (connect failure, timeout).
    #[error("No response from {url}: {message}")]
    NoResponse { url: String, message: String },

    /// The request could not be built or sent.
    #[error("Request to {url} could not be completed: {message}")]
    Request { url: String, message: String },

    /// A success response arrived but its body could not be decoded.
    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
}

impl TransportError {
    /// Create an error-status error.
    pub fn status(url: impl Into<String>, status: u16, body: Value) -> Self {
        Self::Status { url: url.into(), status, body }
    }

    /// Create a no-response error.
    pub fn no_response(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NoResponse { url: url.into(), message: message.into() }
    }

    /// Create a request setup error.
    pub fn request(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request { url: url.into(), message: message.into() }
    }

    /// Create an undecodable-response error.
    pub fn invalid_response(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse { url: url.into(), message: message.into() }
    }

    /// The URL the failed request targeted.
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. }
            | Self::NoResponse { url, .. }
            | Self::Request { url, .. }
            | Self::InvalidResponse { url, .. } => url,
        }
    }

    /// HTTP status, when the server responded.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short classification label used in logs.
    pub fn classification(&self) -> &'static str {
        match self {
            Self::Status { .. } => "error_status",
            Self::NoResponse { .. } => "no_response",
            Self::Request { .. } => "request_setup",
            Self::InvalidResponse { .. } => "invalid_response",
        }
    }

    /// Structured detail for the failure log.
    pub fn details(&self) -> Value {
        match self {
            Self::Status { url, status, body } => json!({
                "error_status": status,
                "error_response": body,
                "request_url": url,
            }),
            Self::NoResponse { url, message } => json!({
                "error_request": message,
                "request_url": url,
            }),
            Self::Request { url, message } => json!({
                "message": message,
                "request_url": url,
            }),
            Self::InvalidResponse { url, message } => json!({
                "error_response_decode": message,
                "request_url": url,
            }),
        }
    }
}
