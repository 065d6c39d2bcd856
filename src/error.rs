//! Service-level error types.
//!
//! Per-file and per-chunk failures are handled locally (logged and
//! skipped) inside the pipeline; everything surfaced through
//! `ServiceError` is request-terminal and maps to an HTTP 500 at the
//! server boundary.

use thiserror::Error;

use crate::completion::SnapshotError;
use crate::embedding::{CompletionError, EmbedError};
use crate::vector::VectorError;

/// Request-terminal errors from the completion service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Could not chunk file '{path}': {source}")]
    Chunk {
        path: String,
        source: std::io::Error,
    },

    #[error("Vector index error: {0}")]
    Vector(#[from] VectorError),

    #[error("Embedding error: {0}")]
    Embed(#[from] EmbedError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
