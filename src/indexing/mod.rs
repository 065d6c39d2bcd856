//! File discovery, chunking, and live reconciliation.

mod chunker;
mod walker;
mod watcher;

pub use chunker::{chunk_content, chunk_file, Chunk};
pub use walker::{is_excluded_file, WorkspaceWalker};
pub use watcher::{FileWatchError, WorkspaceWatcher};
