//! Content-addressed memoization of chunk embeddings.
//!
//! Keyed by the SHA-256 of `file_path:content`, so an unchanged chunk
//! never hits the embedding backend twice. Entries live for the
//! process lifetime; there is no eviction. Values are copied both in
//! and out so callers can never observe or mutate internal storage.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Computes the deterministic cache key for a file path and chunk
/// content: the hex-encoded SHA-256 of `file_path || ":" || content`.
#[must_use]
pub fn compute_key(file_path: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update(b":");
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Thread-safe in-memory embedding cache.
///
/// Concurrent readers share the lock; writers take it exclusively.
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    store: RwLock<HashMap<String, Vec<f32>>>,
}

impl EmbeddingCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the embedding stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.store.read().get(key).cloned()
    }

    /// Stores a copy of `embedding` under `key`, replacing any
    /// previous value.
    pub fn set(&self, key: &str, embedding: &[f32]) {
        self.store.write().insert(key.to_string(), embedding.to_vec());
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }
}
