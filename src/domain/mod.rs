//! Domain layer
//!
//! Pure types describing what the migrator moves: secret paths, the kind of
//! leaf a path denotes, and the unit of work handed to a leaf processor.
//! Nothing here touches the network or the failure log.

pub mod leaf;

pub use leaf::{is_directory, join_path, LeafKind, LeafTask, RecordKind};
