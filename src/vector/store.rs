//! In-memory vector store with selectable search strategy.
//!
//! `add` always replaces the full contents: the service rebuilds the
//! store from its staged inventory on every mutation, so there is no
//! per-vector removal. The store exclusively owns its vectors, the
//! documents, and the graph built over them; dropping or closing the
//! store releases everything.

use super::hnsw::{HnswGraph, HnswParams};
use super::types::{euclidean_distance, VectorDimension, VectorError, VectorResult};

/// Which search path the store uses.
#[derive(Debug, Clone)]
pub enum IndexStrategy {
    /// Exact full scan. Deterministic; earliest insertion wins ties.
    BruteForce,
    /// Approximate layered graph search.
    Hnsw(HnswParams),
}

/// K-nearest-neighbor store over fixed-dimension float vectors.
#[derive(Debug)]
pub struct VectorStore {
    dimension: VectorDimension,
    strategy: IndexStrategy,
    vectors: Vec<Vec<f32>>,
    documents: Vec<String>,
    graph: Option<HnswGraph>,
    closed: bool,
}

impl VectorStore {
    /// Creates an empty store using HNSW search with default parameters.
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self::with_strategy(dimension, IndexStrategy::Hnsw(HnswParams::default()))
    }

    /// Creates an empty store using exact brute-force search.
    #[must_use]
    pub fn brute_force(dimension: VectorDimension) -> Self {
        Self::with_strategy(dimension, IndexStrategy::BruteForce)
    }

    /// Creates an empty store with an explicit strategy.
    #[must_use]
    pub fn with_strategy(dimension: VectorDimension, strategy: IndexStrategy) -> Self {
        Self {
            dimension,
            strategy,
            vectors: Vec::new(),
            documents: Vec::new(),
            graph: None,
            closed: false,
        }
    }

    /// Replaces the store contents with the given parallel arrays.
    ///
    /// Passing empty arrays clears the store. Fails without touching
    /// the previous contents when the arrays differ in length or any
    /// vector does not match the store dimension.
    pub fn add(&mut self, vectors: Vec<Vec<f32>>, documents: Vec<String>) -> VectorResult<()> {
        if self.closed {
            return Err(VectorError::Closed);
        }
        if vectors.len() != documents.len() {
            return Err(VectorError::LengthMismatch {
                vectors: vectors.len(),
                documents: documents.len(),
            });
        }
        for vector in &vectors {
            self.dimension.validate_vector(vector)?;
        }

        self.vectors = vectors;
        self.documents = documents;
        self.graph = None;

        if !self.vectors.is_empty() {
            if let IndexStrategy::Hnsw(params) = &self.strategy {
                self.graph = Some(HnswGraph::build(&self.vectors, params.clone()));
            }
        }

        Ok(())
    }

    /// Returns the documents of the k nearest vectors, ascending by
    /// Euclidean distance. Returns all documents in order when fewer
    /// than k vectors exist.
    ///
    /// Fails on an empty or closed store, when `k` is zero, or when
    /// the query dimension does not match.
    pub fn query(&self, query: &[f32], k: usize) -> VectorResult<Vec<String>> {
        if self.closed {
            return Err(VectorError::Closed);
        }
        if self.vectors.is_empty() {
            return Err(VectorError::EmptyIndex);
        }
        if k == 0 {
            return Err(VectorError::InvalidK);
        }
        self.dimension.validate_vector(query)?;

        let ids = match &self.graph {
            Some(graph) => graph.search(&self.vectors, query, k, 4 * k),
            None => self.brute_force_search(query, k),
        };

        Ok(ids
            .into_iter()
            .map(|id| self.documents[id as usize].clone())
            .collect())
    }

    /// Releases all backing storage. The store is unusable afterwards.
    pub fn close(&mut self) {
        self.vectors = Vec::new();
        self.documents = Vec::new();
        self.graph = None;
        self.closed = true;
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The store dimension.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Exact scan maintaining a sorted k-bounded array by insertion.
    ///
    /// Strict comparison keeps earlier insertions ahead on distance
    /// ties. Returns a short list when fewer than k vectors exist.
    fn brute_force_search(&self, query: &[f32], k: usize) -> Vec<u32> {
        let limit = k.min(self.vectors.len());
        let mut neighbors: Vec<u32> = Vec::with_capacity(limit);
        let mut distances: Vec<f32> = Vec::with_capacity(limit);

        for (id, vector) in self.vectors.iter().enumerate() {
            let distance = euclidean_distance(query, vector);
            let position = distances.partition_point(|&d| d <= distance);
            if position < limit {
                if distances.len() == limit {
                    distances.pop();
                    neighbors.pop();
                }
                distances.insert(position, distance);
                neighbors.insert(position, id as u32);
            }
        }

        neighbors
    }
}
