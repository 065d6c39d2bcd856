//! Cloud embedding backend and the completion LLM client.
//!
//! Both talk to an OpenAI-compatible API. The embedder submits a
//! single-element input and takes the first returned vector; the
//! completion client wraps the chat endpoint, either collecting one
//! response string or streaming incremental tokens.

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{EmbedError, EmbedResult};
use crate::config::OpenAiConfig;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Probe text for dimension discovery.
const PROBE_TEXT: &str = "test";

/// Completion model used when none is configured.
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4.1-nano";

/// Documented dimensions for the known embedding model families.
///
/// A hint only: the effective dimension is always taken from the
/// first probe response.
#[must_use]
pub fn known_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedding backend for the remote OpenAI endpoint.
#[derive(Debug)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    detected_dimensions: usize,
}

impl OpenAiEmbedder {
    /// Connects to the OpenAI API and probes for the dimension.
    pub async fn connect(config: &OpenAiConfig) -> EmbedResult<Self> {
        Self::connect_to(OPENAI_API_BASE, config).await
    }

    /// Connects against a custom base URL. Exists for tests driving an
    /// OpenAI-compatible stub.
    pub async fn connect_to(base_url: &str, config: &OpenAiConfig) -> EmbedResult<Self> {
        let mut embedder = Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            detected_dimensions: 0,
        };

        let probe = embedder.request_embedding(PROBE_TEXT).await?;
        if probe.is_empty() {
            return Err(EmbedError::Empty);
        }
        if let Some(hint) = known_dimensions(&config.model) {
            if hint != probe.len() {
                warn!(
                    model = %config.model,
                    hint,
                    detected = probe.len(),
                    "documented dimension differs from probe; using probe"
                );
            }
        }
        embedder.detected_dimensions = probe.len();

        info!(
            model = %config.model,
            dimensions = embedder.detected_dimensions,
            "cloud embedder connected"
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
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "input": [text], "model": self.model }))
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

        let payload: EmbeddingResponse = response.json().await?;
        payload
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or(EmbedError::Empty)
    }
}

/// Errors raised by the completion client.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Completion response contained no choices")]
    NoChoices,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

/// One parsed server-sent-event line from a streaming completion.
#[derive(Debug, PartialEq)]
enum StreamEvent {
    /// An incremental content token.
    Content(String),
    /// The `[DONE]` terminator.
    Done,
    /// Keep-alives, empty deltas, and anything unparseable.
    Skip,
}

fn parse_stream_line(line: &str) -> StreamEvent {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return StreamEvent::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return StreamEvent::Done;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .map_or(StreamEvent::Skip, StreamEvent::Content),
        Err(_) => StreamEvent::Skip,
    }
}

/// Client for the completion LLM.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl CompletionClient {
    /// Creates a client; an empty model selects the default.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: if model.is_empty() {
                DEFAULT_COMPLETION_MODEL.to_string()
            } else {
                model
            },
            base_url: OPENAI_API_BASE.to_string(),
        }
    }

    /// Points the client at an OpenAI-compatible base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Generates one completion for the prompt.
    pub async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: ChatResponse = response.json().await?;
        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(CompletionError::NoChoices)
    }

    /// Streams incremental completion tokens into `tx`.
    ///
    /// The channel closes when the sender drops: at stream end, on any
    /// transport or protocol error, or when the receiver goes away.
    pub async fn complete_stream(&self, prompt: &str, tx: mpsc::Sender<String>) {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "stream": true,
            }))
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                error!(status = %response.status(), "streaming completion rejected");
                return;
            }
            Err(e) => {
                error!("streaming completion request failed: {e}");
                return;
            }
        };

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    error!("streaming completion transport error: {e}");
                    return;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();
                match parse_stream_line(&line) {
                    StreamEvent::Content(token) => {
                        if tx.send(token).await.is_err() {
                            return;
                        }
                    }
                    StreamEvent::Done => return,
                    StreamEvent::Skip => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_dimensions_cover_documented_models() {
        assert_eq!(known_dimensions("text-embedding-3-small"), Some(1536));
        assert_eq!(known_dimensions("text-embedding-3-large"), Some(3072));
        assert_eq!(known_dimensions("text-embedding-ada-002"), Some(1536));
        assert_eq!(known_dimensions("some-new-model"), None);
    }

    #[test]
    fn test_embedding_response_deserializes() {
        let payload: EmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[0.1,0.2,0.3]}]}"#).unwrap();
        assert_eq!(payload.data[0].embedding, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_parse_stream_line_extracts_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"fn "}}]}"#;
        assert_eq!(
            parse_stream_line(line),
            StreamEvent::Content("fn ".to_string())
        );
    }

    #[test]
    fn test_parse_stream_line_handles_done_and_noise() {
        assert_eq!(parse_stream_line("data: [DONE]"), StreamEvent::Done);
        assert_eq!(parse_stream_line(""), StreamEvent::Skip);
        assert_eq!(parse_stream_line(": keep-alive"), StreamEvent::Skip);
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{}}]}"#),
            StreamEvent::Skip
        );
    }

    #[test]
    fn test_empty_model_falls_back_to_default() {
        let client = CompletionClient::new("key", "");
        assert_eq!(client.model, DEFAULT_COMPLETION_MODEL);

        let client = CompletionClient::new("key", "gpt-4.1-mini");
        assert_eq!(client.model, "gpt-4.1-mini");
    }
}
