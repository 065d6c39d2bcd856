//! Completion service: the chunk -> embed -> store pipeline and
//! retrieval-augmented completions over it.
//!
//! The staged inventory is the authoritative record; the vector index
//! is always derived from it by a full rebuild. Rebuilds run one at a
//! time behind an async mutex and publish a freshly built store
//! through a brief write lock, so completions racing a long rebuild
//! keep querying the previous index until the swap.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use super::prompt::build_prompt;
use super::snapshot::{self, Snapshot};
use crate::config::Config;
use crate::embedding::{compute_key, CompletionClient, Embedder, EmbeddingCache};
use crate::error::{ServiceError, ServiceResult};
use crate::indexing::{chunk_file, Chunk, WorkspaceWalker};
use crate::vector::{VectorDimension, VectorStore};

/// Number of similar documents retrieved per completion.
const RETRIEVAL_K: usize = 5;

/// Core service tying the pipeline together.
pub struct CompletionService {
    /// Authoritative mapping from file path to its chunks. Mutated
    /// only by indexing operations; the mutex serializes them.
    inventory: Mutex<BTreeMap<String, Vec<Chunk>>>,
    /// Published index handle. Queries clone the `Arc` and search
    /// without holding the lock.
    index: RwLock<Arc<VectorStore>>,
    embedder: Embedder,
    llm: CompletionClient,
    cache: EmbeddingCache,
    config: Config,
    dimension: VectorDimension,
}

impl CompletionService {
    /// Creates a service over an already-validated embedder.
    pub fn new(embedder: Embedder, llm: CompletionClient, config: Config) -> ServiceResult<Self> {
        let dimension = VectorDimension::new(embedder.dimensions())?;
        Ok(Self {
            inventory: Mutex::new(BTreeMap::new()),
            index: RwLock::new(Arc::new(VectorStore::new(dimension))),
            embedder,
            llm,
            cache: EmbeddingCache::new(),
            config,
            dimension,
        })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of documents in the published index.
    #[must_use]
    pub fn indexed_documents(&self) -> usize {
        self.index.read().len()
    }

    /// Walks and indexes a workspace, or restores its snapshot when
    /// one exists. A snapshot-write failure is logged, not fatal.
    pub async fn index_directory(&self, root: &Path) -> ServiceResult<()> {
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let snapshot_file = self.snapshot_file(&root);

        if snapshot_file.exists() {
            info!(path = %snapshot_file.display(), "snapshot found, loading");
            return self.load_snapshot(&snapshot_file).await;
        }

        info!(root = %root.display(), "indexing directory");
        let files = WorkspaceWalker::new(&self.config).collect(&root);
        let mut fresh: BTreeMap<String, Vec<Chunk>> = BTreeMap::new();
        for file in files {
            match chunk_file(&file) {
                Ok(chunks) => {
                    for chunk in chunks {
                        fresh.entry(chunk.file_path.clone()).or_default().push(chunk);
                    }
                }
                Err(e) => {
                    warn!(path = %file.display(), "could not chunk file, skipping: {e}");
                }
            }
        }
        let staged: usize = fresh.values().map(Vec::len).sum();
        info!(chunks = staged, "staged chunks for indexing");

        let mut inventory = self.inventory.lock().await;
        inventory.extend(fresh);
        let (embeddings, documents) = self.rebuild_locked(&inventory).await?;

        let snapshot = Snapshot {
            inventory: inventory.clone(),
            embeddings,
            documents,
        };
        match snapshot::save(&snapshot_file, &snapshot) {
            Ok(()) => info!(path = %snapshot_file.display(), "index snapshot saved"),
            Err(e) => warn!(path = %snapshot_file.display(), "failed to save snapshot: {e}"),
        }

        info!(root = %root.display(), "finished indexing directory");
        Ok(())
    }

    /// Replaces one file's staged chunks and rebuilds the index.
    pub async fn index_file(&self, path: &Path) -> ServiceResult<()> {
        info!(path = %path.display(), "indexing single file");
        let chunks = chunk_file(path).map_err(|source| ServiceError::Chunk {
            path: path.display().to_string(),
            source,
        })?;

        let mut inventory = self.inventory.lock().await;
        info!(chunks = chunks.len(), path = %path.display(), "staged chunks");
        inventory.insert(path.display().to_string(), chunks);
        self.rebuild_locked(&inventory).await.map(|_| ())
    }

    /// Removes a file's staged chunks and rebuilds. Deleting a path
    /// that was never indexed succeeds without a rebuild.
    pub async fn delete_file(&self, path: &str) -> ServiceResult<()> {
        let mut inventory = self.inventory.lock().await;
        if inventory.remove(path).is_none() {
            info!(path, "nothing to delete");
            return Ok(());
        }
        info!(path, "removed from inventory, rebuilding");
        self.rebuild_locked(&inventory).await.map(|_| ())
    }

    /// Generates a completion: embed the cursor context, retrieve the
    /// nearest indexed fragments, and query the LLM with the shaped
    /// prompt.
    pub async fn get_completion(&self, file_path: &str, content: &str) -> ServiceResult<String> {
        info!(file_path, "completion requested");
        let query = self.embedder.embed(content).await?;
        let index = self.index.read().clone();
        let similar = index.query(&query, RETRIEVAL_K)?;
        let prompt = build_prompt(content, &similar);
        Ok(self.llm.complete(&prompt).await?)
    }

    /// Streaming variant of [`get_completion`](Self::get_completion).
    ///
    /// Incremental tokens are sent into `tx`; the channel closes on
    /// end or error.
    pub async fn get_completion_stream(
        &self,
        file_path: &str,
        content: &str,
        tx: mpsc::Sender<String>,
    ) {
        info!(file_path, "streaming completion requested");
        let query = match self.embedder.embed(content).await {
            Ok(query) => query,
            Err(e) => {
                error!("failed to embed query for streaming: {e}");
                return;
            }
        };
        let similar = {
            let index = self.index.read().clone();
            match index.query(&query, RETRIEVAL_K) {
                Ok(similar) => similar,
                Err(e) => {
                    error!("failed to query index for streaming: {e}");
                    return;
                }
            }
        };
        info!(documents = similar.len(), "retrieved context for streaming completion");
        let prompt = build_prompt(content, &similar);
        self.llm.complete_stream(&prompt, tx).await;
    }

    /// Rebuilds the index from the staged inventory, embedding every
    /// chunk through the cache. Chunks whose embed fails are dropped
    /// with a warning. The new store is published atomically; readers
    /// keep the previous one until the swap.
    ///
    /// Returns the parallel arrays for snapshotting. Callers must hold
    /// the inventory lock.
    async fn rebuild_locked(
        &self,
        inventory: &BTreeMap<String, Vec<Chunk>>,
    ) -> ServiceResult<(Vec<Vec<f32>>, Vec<String>)> {
        info!("rebuilding vector index");
        let mut embeddings: Vec<Vec<f32>> = Vec::new();
        let mut documents: Vec<String> = Vec::new();

        for chunks in inventory.values() {
            for chunk in chunks {
                let key = compute_key(&chunk.file_path, &chunk.content);
                let embedding = match self.cache.get(&key) {
                    Some(cached) => cached,
                    None => match self.embedder.embed(&chunk.content).await {
                        Ok(embedding) => {
                            self.cache.set(&key, &embedding);
                            embedding
                        }
                        Err(e) => {
                            warn!(
                                path = %chunk.file_path,
                                "could not embed chunk, dropping: {e}"
                            );
                            continue;
                        }
                    },
                };
                embeddings.push(embedding);
                documents.push(chunk.content.clone());
            }
        }

        let mut store = VectorStore::new(self.dimension);
        store.add(embeddings.clone(), documents.clone())?;
        *self.index.write() = Arc::new(store);
        info!(vectors = embeddings.len(), "vector index rebuilt");
        Ok((embeddings, documents))
    }

    /// Restores inventory and index from a snapshot. The embedding
    /// cache is warmed in flattening order so unchanged chunks never
    /// re-embed after a restart.
    async fn load_snapshot(&self, path: &Path) -> ServiceResult<()> {
        let snapshot = snapshot::load(path)?;

        let mut store = VectorStore::new(self.dimension);
        store.add(snapshot.embeddings.clone(), snapshot.documents.clone())?;

        let mut inventory = self.inventory.lock().await;
        *inventory = snapshot.inventory;

        let total_chunks: usize = inventory.values().map(Vec::len).sum();
        if total_chunks == snapshot.embeddings.len() {
            let mut position = 0usize;
            for chunks in inventory.values() {
                for chunk in chunks {
                    self.cache.set(
                        &compute_key(&chunk.file_path, &chunk.content),
                        &snapshot.embeddings[position],
                    );
                    position += 1;
                }
            }
        }

        *self.index.write() = Arc::new(store);
        info!(
            path = %path.display(),
            documents = snapshot.documents.len(),
            "index loaded from snapshot"
        );
        Ok(())
    }

    /// Snapshot file for a workspace root, falling back to the root
    /// itself when no user cache directory exists.
    fn snapshot_file(&self, root: &Path) -> PathBuf {
        let cache_root = self
            .config
            .snapshot_cache_dir
            .clone()
            .or_else(snapshot::default_cache_root)
            .unwrap_or_else(|| root.to_path_buf());
        snapshot::snapshot_path(&cache_root, root)
    }
}
