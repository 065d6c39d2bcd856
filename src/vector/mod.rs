//! K-nearest-neighbor search over fixed-dimension float vectors.
//!
//! The store owns its vectors, documents, and graph; `add` is a full
//! replace and queries run against whichever strategy the store was
//! built with (exact brute force or an HNSW proximity graph).

mod hnsw;
mod store;
mod types;

pub use hnsw::{HnswGraph, HnswParams};
pub use store::{IndexStrategy, VectorStore};
pub use types::{VectorDimension, VectorError, VectorResult};
