//! Secret store access.
//!
//! Both ends of a migration are instances of the same hierarchical secret
//! store (a key-value tree plus a transit engine holding named encryption
//! keys). The [`SecretStore`] trait exposes exactly the operations the
//! migrator needs:
//!
//! - **list**: children of a prefix (directories end with `/`)
//! - **read** / **write**: opaque JSON payloads at a path
//! - **export_key_backup** / **import_key_backup**: transit key backup blobs
//! - **enable_export_and_backup**: flip a key's config so it may be exported
//!
//! Implementations are plain request/response; retrying is the caller's job.
//!
//! # Backends
//!
//! - [`HttpSecretStore`]: talks to a live endpoint over HTTP
//! - [`InMemorySecretStore`]: process-local tree, used by tests and rehearsals

pub mod client;
pub mod error;
pub mod http;
pub mod memory;

pub use client::{KeyBackup, SecretStore};
pub use error::{StoreResult, TransportError};
pub use http::{EndpointConfig, HttpSecretStore};
pub use memory::InMemorySecretStore;
