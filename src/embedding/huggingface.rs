//! Hosted-model inference backend.
//!
//! Calls the Hugging Face inference API by model id with a
//! feature-extraction request (cache hit and wait-for-model both on).
//! Authentication is optional: public models work without a token,
//! gated ones surface an authentication error naming the variables to
//! set. Input text is truncated to the configured maximum length
//! before submission.

use serde_json::json;
use tracing::{info, warn};

use super::{EmbedError, EmbedResult};
use crate::config::HuggingFaceConfig;

const INFERENCE_API_BASE: &str = "https://api-inference.huggingface.co/pipeline/feature-extraction";

/// Probe text for dimension discovery.
const PROBE_TEXT: &str = "Hello world";

/// Environment variables checked, in order, for the API token.
const TOKEN_VARS: [&str; 2] = ["HUGGINGFACEHUB_API_TOKEN", "HF_TOKEN"];

/// Embedding backend for the Hugging Face inference API.
#[derive(Debug)]
pub struct HuggingFaceEmbedder {
    client: reqwest::Client,
    config: HuggingFaceConfig,
    token: Option<String>,
    base_url: String,
    detected_dimensions: usize,
}

impl HuggingFaceEmbedder {
    /// Connects to the inference API and probes for the dimension.
    ///
    /// Creates the local artifact cache directory if it does not
    /// exist; nothing is written to it by embed calls.
    pub async fn connect(config: &HuggingFaceConfig) -> EmbedResult<Self> {
        Self::connect_to(INFERENCE_API_BASE, config).await
    }

    /// Connects against a custom base URL. Exists for tests driving a
    /// stub inference endpoint.
    pub async fn connect_to(base_url: &str, config: &HuggingFaceConfig) -> EmbedResult<Self> {
        std::fs::create_dir_all(&config.cache_dir).map_err(|source| EmbedError::CacheDir {
            path: config.cache_dir.display().to_string(),
            source,
        })?;

        let token = TOKEN_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|value| !value.is_empty()));
        if token.is_none() {
            warn!(
                "no Hugging Face API token found; gated models will fail. Set {} or {} if needed",
                TOKEN_VARS[0], TOKEN_VARS[1]
            );
        }

        let mut embedder = Self {
            client: reqwest::Client::new(),
            config: config.clone(),
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
            detected_dimensions: 0,
        };

        let probe = embedder.request_embedding(PROBE_TEXT).await?;
        if probe.is_empty() {
            return Err(EmbedError::Empty);
        }
        embedder.detected_dimensions = probe.len();

        info!(
            model_id = %config.model_id,
            dimensions = embedder.detected_dimensions,
            "hosted embedder connected"
        );
        Ok(embedder)
    }

    /// Embeds one text, truncating it to the configured maximum
    /// length first.
    pub async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        if text.is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let char_count = text.chars().count();
        let truncated: String;
        let text = if char_count > self.config.max_length {
            warn!(
                from = char_count,
                to = self.config.max_length,
                "truncating text before embedding"
            );
            truncated = text.chars().take(self.config.max_length).collect();
            &truncated
        } else {
            text
        };

        self.request_embedding(text).await
    }

    /// Dimension observed on the connect probe.
    #[must_use]
    pub fn detected_dimensions(&self) -> usize {
        self.detected_dimensions
    }

    async fn request_embedding(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let mut request = self
            .client
            .post(format!("{}/{}", self.base_url, self.config.model_id))
            .json(&json!({
                "inputs": [text],
                "options": { "wait_for_model": true, "use_cache": true },
            }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(EmbedError::Authentication {
                model_id: self.config.model_id.clone(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        parse_feature_extraction(&bytes)
    }
}

/// Decodes a feature-extraction response into a single vector.
///
/// Sentence-level models return one vector per input. Token-level
/// models return one vector per token; those are mean-pooled into a
/// single vector.
fn parse_feature_extraction(bytes: &[u8]) -> EmbedResult<Vec<f32>> {
    if let Ok(sentence) = serde_json::from_slice::<Vec<Vec<f32>>>(bytes) {
        return sentence.into_iter().next().ok_or(EmbedError::Empty);
    }

    if let Ok(token_level) = serde_json::from_slice::<Vec<Vec<Vec<f32>>>>(bytes) {
        let tokens = token_level.into_iter().next().ok_or(EmbedError::Empty)?;
        return mean_pool(&tokens);
    }

    Err(EmbedError::Response(
        "feature-extraction response is neither a 2-D nor a 3-D float array".to_string(),
    ))
}

fn mean_pool(tokens: &[Vec<f32>]) -> EmbedResult<Vec<f32>> {
    let first = tokens.first().ok_or(EmbedError::Empty)?;
    let mut pooled = vec![0.0f32; first.len()];
    for token in tokens {
        for (sum, value) in pooled.iter_mut().zip(token.iter()) {
            *sum += value;
        }
    }
    let count = tokens.len() as f32;
    for value in &mut pooled {
        *value /= count;
    }
    Ok(pooled)
}
