//! On-disk snapshot of the staged inventory and its embeddings.
//!
//! One snapshot per workspace, keyed by a hash of the workspace root,
//! lets the service cold-start without walking or re-embedding
//! anything. `documents[i]` corresponds 1:1 to `embeddings[i]` in the
//! inventory's flattening order. The codec round-trips losslessly and
//! rejects truncated input; writes are plain open-write-close and are
//! not crash-safe.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::indexing::Chunk;

/// Serialized index state enabling cold start without re-embedding.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub inventory: BTreeMap<String, Vec<Chunk>>,
    pub embeddings: Vec<Vec<f32>>,
    pub documents: Vec<String>,
}

/// Errors raised by snapshot persistence.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding failed: {0}\nSuggestion: Delete the snapshot and re-index; it will be rebuilt")]
    Codec(#[from] bincode::Error),
}

/// The OS user cache directory, when one exists.
#[must_use]
pub fn default_cache_root() -> Option<PathBuf> {
    dirs::cache_dir()
}

/// Snapshot file location for a workspace root:
/// `<cache_root>/autocomplete/SHA256(root)/index.gob`.
#[must_use]
pub fn snapshot_path(cache_root: &Path, workspace_root: &Path) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(workspace_root.display().to_string().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    cache_root
        .join("autocomplete")
        .join(digest)
        .join("index.gob")
}

/// Writes a snapshot, creating parent directories as needed.
pub fn save(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = bincode::serialize(snapshot)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Reads a snapshot back.
pub fn load(path: &Path) -> Result<Snapshot, SnapshotError> {
    let bytes = fs::read(path)?;
    Ok(bincode::deserialize(&bytes)?)
}
