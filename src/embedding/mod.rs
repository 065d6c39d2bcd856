//! Text-to-vector embedding backends.
//!
//! The three backends share the `embed`/`dimensions` capability set
//! but have otherwise disjoint configuration, so they are dispatched
//! through a sum type fixed at construction. Every backend discovers
//! its dimension by embedding a probe string when it connects; the
//! dimension is stable for the process lifetime and later embeddings
//! that fail to match it are errors.

mod cache;
mod huggingface;
mod local;
mod openai;

pub use cache::{compute_key, EmbeddingCache};
pub use huggingface::HuggingFaceEmbedder;
pub use local::LocalEmbedder;
pub use openai::{known_dimensions, CompletionClient, CompletionError, OpenAiEmbedder};

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use thiserror::Error;
use tracing::info;

/// Errors raised by embedding backends.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Embedding backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Received an empty embedding from the backend")]
    Empty,

    #[error(
        "Embedding dimension mismatch: expected {expected}, got {actual}\nSuggestion: Clear EMBEDDING_DIMENSIONS or switch back to the model the index was built with"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "Authentication failed for model {model_id}. The model may require an API token: set the HUGGINGFACEHUB_API_TOKEN (or HF_TOKEN) environment variable. Tokens are issued at https://huggingface.co/settings/tokens"
    )]
    Authentication { model_id: String },

    #[error("Unexpected embedding response shape: {0}")]
    Response(String),

    #[error("Text to embed cannot be empty")]
    EmptyInput,

    #[error("Failed to create model cache directory '{path}': {source}")]
    CacheDir {
        path: String,
        source: std::io::Error,
    },
}

/// Result type alias for embedding operations.
pub type EmbedResult<T> = Result<T, EmbedError>;

#[derive(Debug)]
enum Backend {
    OpenAi(OpenAiEmbedder),
    Local(LocalEmbedder),
    HuggingFace(HuggingFaceEmbedder),
}

/// The embedding backend selected at startup.
///
/// Construction connects to the configured provider and probes it for
/// the effective dimension. An `EMBEDDING_DIMENSIONS` override takes
/// precedence over the probed value; startup validation then catches
/// any disagreement between the two.
#[derive(Debug)]
pub struct Embedder {
    backend: Backend,
    dimensions: usize,
}

impl Embedder {
    /// Connects the configured backend and discovers its dimension.
    pub async fn from_config(config: &EmbeddingConfig) -> EmbedResult<Self> {
        let backend = match config.provider {
            EmbeddingProvider::OpenAi => {
                Backend::OpenAi(OpenAiEmbedder::connect(&config.openai).await?)
            }
            EmbeddingProvider::Local => {
                Backend::Local(LocalEmbedder::connect(&config.local).await?)
            }
            EmbeddingProvider::HuggingFace => {
                Backend::HuggingFace(HuggingFaceEmbedder::connect(&config.huggingface).await?)
            }
        };

        let detected = match &backend {
            Backend::OpenAi(embedder) => embedder.detected_dimensions(),
            Backend::Local(embedder) => embedder.detected_dimensions(),
            Backend::HuggingFace(embedder) => embedder.detected_dimensions(),
        };
        let dimensions = if config.dimensions > 0 {
            config.dimensions
        } else {
            detected
        };

        info!(provider = %config.provider, dimensions, "embedder initialized");
        Ok(Self {
            backend,
            dimensions,
        })
    }

    /// Wraps an already-connected local embedder. Used when the caller
    /// constructed the backend directly.
    #[must_use]
    pub fn from_local(embedder: LocalEmbedder) -> Self {
        let dimensions = embedder.detected_dimensions();
        Self {
            backend: Backend::Local(embedder),
            dimensions,
        }
    }

    /// Embeds one text, enforcing the fixed dimension.
    pub async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let embedding = match &self.backend {
            Backend::OpenAi(embedder) => embedder.embed(text).await?,
            Backend::Local(embedder) => embedder.embed(text).await?,
            Backend::HuggingFace(embedder) => embedder.embed(text).await?,
        };
        if embedding.len() != self.dimensions {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }

    /// The effective embedding dimension, stable for the process
    /// lifetime.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Startup validation: embeds a probe string and checks its length
    /// against the reported dimension. A mismatch is fatal for boot.
    pub async fn validate_connection(&self) -> EmbedResult<()> {
        let probe = self.embed("Hello world").await?;
        if probe.len() != self.dimensions {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dimensions,
                actual: probe.len(),
            });
        }
        info!(dimensions = self.dimensions, "embedder connection validated");
        Ok(())
    }
}
