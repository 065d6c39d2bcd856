//! Local embedding server backend.
//!
//! Speaks three wire dialects, chosen by configuration:
//!
//! - `tei`: POST `/embed` with `{"inputs": [text]}`; the response is a
//!   bare two-dimensional float array.
//! - `ollama`: POST `/api/embeddings` with `{"model": M, "prompt":
//!   text}`; the server only accepts one text per request and replies
//!   `{"embedding": [...]}`.
//! - `custom` (OpenAI-compatible): POST `/embeddings` with
//!   `{"input": [text], "model": M?}`; the response carries either a
//!   `data` array of objects or a bare `embeddings` array, whichever
//!   the server populates.

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use super::{EmbedError, EmbedResult};
use crate::config::{LocalConfig, LocalDialect};

/// Probe text for dimension discovery.
const PROBE_TEXT: &str = "test";

/// Embedding backend for a local embedding server.
#[derive(Debug)]
pub struct LocalEmbedder {
    client: reqwest::Client,
    config: LocalConfig,
    detected_dimensions: usize,
}

impl LocalEmbedder {
    /// Connects to the configured server and probes for the dimension.
    ///
    /// All requests honor the configured per-request timeout.
    pub async fn connect(config: &LocalConfig) -> EmbedResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let mut embedder = Self {
            client,
            config: config.clone(),
            detected_dimensions: 0,
        };

        let probe = embedder.request_embedding(PROBE_TEXT).await?;
        if probe.is_empty() {
            return Err(EmbedError::Empty);
        }
        embedder.detected_dimensions = probe.len();

        info!(
            url = %config.server_url,
            dialect = ?config.dialect,
            dimensions = embedder.detected_dimensions,
            "local embedder connected"
        );
        Ok(embedder)
    }

    /// Embeds one text.
    pub async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        self.request_embedding(text).await
    }

    /// Dimension observed on the connect probe.
    #[must_use]
    pub fn detected_dimensions(&self) -> usize {
        self.detected_dimensions
    }

    async fn request_embedding(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let response = self
            .client
            .post(embed_endpoint(&self.config))
            .json(&request_body(&self.config, text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let embeddings = parse_response(self.config.dialect, &bytes)?;
        embeddings.into_iter().next().ok_or(EmbedError::Empty)
    }
}

/// Full embedding endpoint URL for the configured dialect.
fn embed_endpoint(config: &LocalConfig) -> String {
    let base = config.server_url.trim_end_matches('/');
    let path = match config.dialect {
        LocalDialect::Tei => "/embed",
        LocalDialect::Ollama => "/api/embeddings",
        LocalDialect::Custom => "/embeddings",
    };
    format!("{base}{path}")
}

/// Request body for one text in the configured dialect.
fn request_body(config: &LocalConfig, text: &str) -> serde_json::Value {
    match config.dialect {
        LocalDialect::Tei => json!({ "inputs": [text] }),
        LocalDialect::Ollama => json!({
            "model": config.model_name,
            "prompt": text,
        }),
        LocalDialect::Custom => {
            let mut body = json!({ "input": [text] });
            if !config.model_name.is_empty() {
                body["model"] = json!(config.model_name);
            }
            body
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct CustomResponse {
    #[serde(default)]
    data: Vec<CustomEmbedding>,
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct CustomEmbedding {
    embedding: Vec<f32>,
}

/// Decodes a response body into embeddings, one per input text.
fn parse_response(dialect: LocalDialect, bytes: &[u8]) -> EmbedResult<Vec<Vec<f32>>> {
    match dialect {
        LocalDialect::Tei => serde_json::from_slice::<Vec<Vec<f32>>>(bytes)
            .map_err(|e| EmbedError::Response(format!("failed to decode tei response: {e}"))),
        LocalDialect::Ollama => serde_json::from_slice::<OllamaResponse>(bytes)
            .map(|response| vec![response.embedding])
            .map_err(|e| EmbedError::Response(format!("failed to decode ollama response: {e}"))),
        LocalDialect::Custom => {
            let response: CustomResponse = serde_json::from_slice(bytes)
                .map_err(|e| EmbedError::Response(format!("failed to decode custom response: {e}")))?;
            if !response.data.is_empty() {
                return Ok(response
                    .data
                    .into_iter()
                    .map(|item| item.embedding)
                    .collect());
            }
            if !response.embeddings.is_empty() {
                return Ok(response.embeddings);
            }
            Err(EmbedError::Response(
                "no embeddings found in custom response".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dialect: LocalDialect) -> LocalConfig {
        LocalConfig {
            server_url: "http://localhost:8080".to_string(),
            model_name: "nomic-embed-text".to_string(),
            timeout_secs: 30,
            dialect,
        }
    }

    #[test]
    fn test_endpoints_per_dialect() {
        assert_eq!(
            embed_endpoint(&config(LocalDialect::Tei)),
            "http://localhost:8080/embed"
        );
        assert_eq!(
            embed_endpoint(&config(LocalDialect::Ollama)),
            "http://localhost:8080/api/embeddings"
        );
        assert_eq!(
            embed_endpoint(&config(LocalDialect::Custom)),
            "http://localhost:8080/embeddings"
        );
    }

    #[test]
    fn test_trailing_slash_is_tolerated() {
        let mut config = config(LocalDialect::Tei);
        config.server_url = "http://localhost:8080/".to_string();
        assert_eq!(embed_endpoint(&config), "http://localhost:8080/embed");
    }

    #[test]
    fn test_request_bodies_per_dialect() {
        assert_eq!(
            request_body(&config(LocalDialect::Tei), "hello"),
            json!({ "inputs": ["hello"] })
        );
        assert_eq!(
            request_body(&config(LocalDialect::Ollama), "hello"),
            json!({ "model": "nomic-embed-text", "prompt": "hello" })
        );
        assert_eq!(
            request_body(&config(LocalDialect::Custom), "hello"),
            json!({ "input": ["hello"], "model": "nomic-embed-text" })
        );
    }

    #[test]
    fn test_custom_body_omits_empty_model() {
        let mut config = config(LocalDialect::Custom);
        config.model_name = String::new();
        assert_eq!(
            request_body(&config, "hello"),
            json!({ "input": ["hello"] })
        );
    }

    #[test]
    fn test_parse_tei_response() {
        let parsed = parse_response(LocalDialect::Tei, br#"[[0.1, 0.2], [0.3, 0.4]]"#).unwrap();
        assert_eq!(parsed, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn test_parse_ollama_response() {
        let parsed =
            parse_response(LocalDialect::Ollama, br#"{"embedding": [0.5, 0.6]}"#).unwrap();
        assert_eq!(parsed, vec![vec![0.5, 0.6]]);
    }

    #[test]
    fn test_parse_custom_response_prefers_data() {
        let body = br#"{"data":[{"embedding":[1.0]}],"embeddings":[[9.0]]}"#;
        let parsed = parse_response(LocalDialect::Custom, body).unwrap();
        assert_eq!(parsed, vec![vec![1.0]]);
    }

    #[test]
    fn test_parse_custom_response_falls_back_to_embeddings() {
        let parsed =
            parse_response(LocalDialect::Custom, br#"{"embeddings":[[1.0, 2.0]]}"#).unwrap();
        assert_eq!(parsed, vec![vec![1.0, 2.0]]);
    }

    #[test]
    fn test_parse_custom_response_rejects_empty() {
        let err = parse_response(LocalDialect::Custom, br#"{}"#).unwrap_err();
        assert!(matches!(err, EmbedError::Response(_)));
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(parse_response(LocalDialect::Tei, b"not json").is_err());
        assert!(parse_response(LocalDialect::Ollama, b"[]").is_err());
    }
}
