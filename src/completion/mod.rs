//! Indexing pipeline, snapshotting, and retrieval-augmented completion.

mod prompt;
mod service;
mod snapshot;

pub use prompt::{build_prompt, detect_language, Language};
pub use service::CompletionService;
pub use snapshot::{default_cache_root, snapshot_path, Snapshot, SnapshotError};
