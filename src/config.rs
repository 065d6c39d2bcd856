//! Environment-driven configuration for the autocomplete backend.
//!
//! Every setting comes from an environment variable; there is no
//! config file. Validation is strict at startup: unknown provider
//! names, unknown local server dialects, non-positive timeouts or
//! lengths, and missing per-provider required fields all refuse to
//! boot.
//!
//! | Variable | Effect |
//! |---|---|
//! | `EMBEDDING_PROVIDER` | `openai` \| `local` \| `huggingface` |
//! | `OPENAI_API_KEY` | Cloud embedding key |
//! | `OPENAI_EMBEDDING_MODEL` | Cloud embedding model |
//! | `OPENAI_COMPLETION_MODEL` | Cloud completion model |
//! | `LOCAL_EMBEDDING_URL` | Base URL of the local embedding server |
//! | `LOCAL_EMBEDDING_SERVER_TYPE` | `tei` \| `ollama` \| `custom` |
//! | `LOCAL_EMBEDDING_MODEL` | Model name, if the dialect needs one |
//! | `LOCAL_EMBEDDING_TIMEOUT` | Request timeout in seconds (> 0) |
//! | `HUGGINGFACE_MODEL_ID` | Hosted model id |
//! | `HUGGINGFACE_CACHE_DIR` | Local artifact cache path |
//! | `HUGGINGFACE_USE_GPU` | Boolean hint |
//! | `HUGGINGFACE_MAX_LENGTH` | Truncation threshold in chars (> 0) |
//! | `HUGGINGFACE_BATCH_SIZE` | Batch hint (> 0) |
//! | `EMBEDDING_DIMENSIONS` | Override the auto-detected dimension |
//! | `EXCLUDED_FILES` | Comma-separated file names to skip |
//! | `EXCLUDED_EXTENSIONS` | Comma-separated extensions to skip |

use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Which embedding backend to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    OpenAi,
    Local,
    HuggingFace,
}

impl EmbeddingProvider {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "local" => Ok(Self::Local),
            "huggingface" => Ok(Self::HuggingFace),
            other => Err(ConfigError::UnknownProvider {
                provider: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::OpenAi => "openai",
            Self::Local => "local",
            Self::HuggingFace => "huggingface",
        };
        write!(f, "{name}")
    }
}

/// Wire dialect spoken by a local embedding server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalDialect {
    /// Text Embeddings Inference: `/embed`, bare 2-D array response.
    Tei,
    /// Ollama: `/api/embeddings`, single prompt per request.
    Ollama,
    /// OpenAI-compatible: `/embeddings`, `data` or `embeddings` reply.
    Custom,
}

impl LocalDialect {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_lowercase().as_str() {
            "tei" => Ok(Self::Tei),
            "ollama" => Ok(Self::Ollama),
            "custom" => Ok(Self::Custom),
            other => Err(ConfigError::UnknownDialect {
                dialect: other.to_string(),
            }),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    /// File names excluded from directory indexing.
    pub excluded_files: Vec<String>,
    /// File extensions excluded from directory indexing
    /// (matched case-insensitively, without the leading dot).
    pub excluded_extensions: Vec<String>,
    /// Override for the snapshot cache root. `None` uses the OS user
    /// cache directory.
    pub snapshot_cache_dir: Option<PathBuf>,
}

/// Embedding provider selection plus per-provider settings.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub openai: OpenAiConfig,
    pub local: LocalConfig,
    pub huggingface: HuggingFaceConfig,
    /// Embedding dimension override; 0 means auto-detect via probe.
    pub dimensions: usize,
    /// Cloud completion model; empty selects the default at client
    /// construction.
    pub completion_model: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub server_url: String,
    pub model_name: String,
    pub timeout_secs: u64,
    pub dialect: LocalDialect,
}

#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    pub model_id: String,
    pub cache_dir: PathBuf,
    pub use_gpu: bool,
    pub max_length: usize,
    pub batch_size: usize,
}

// Default value functions
fn default_openai_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_local_server_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_local_timeout_secs() -> u64 {
    30
}
fn default_huggingface_model_id() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}
fn default_huggingface_cache_dir() -> PathBuf {
    PathBuf::from("./models")
}
fn default_huggingface_max_length() -> usize {
    512
}
fn default_huggingface_batch_size() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            excluded_files: Vec::new(),
            excluded_extensions: Vec::new(),
            snapshot_cache_dir: None,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAi,
            openai: OpenAiConfig::default(),
            local: LocalConfig::default(),
            huggingface: HuggingFaceConfig::default(),
            dimensions: 0,
            completion_model: String::new(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_openai_embedding_model(),
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            server_url: default_local_server_url(),
            model_name: String::new(),
            timeout_secs: default_local_timeout_secs(),
            dialect: LocalDialect::Tei,
        }
    }
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            model_id: default_huggingface_model_id(),
            cache_dir: default_huggingface_cache_dir(),
            use_gpu: false,
            max_length: default_huggingface_max_length(),
            batch_size: default_huggingface_batch_size(),
        }
    }
}

/// Errors raised by configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid embedding provider: {provider} (must be 'openai', 'local', or 'huggingface')")]
    UnknownProvider { provider: String },

    #[error("Invalid local server type: {dialect} (must be one of: tei, ollama, custom)")]
    UnknownDialect { dialect: String },

    #[error("{variable} must be a positive integer, got '{value}'")]
    InvalidNumber { variable: &'static str, value: String },

    #[error("{variable} must be a boolean, got '{value}'")]
    InvalidBool { variable: &'static str, value: String },

    #[error("OpenAI API key is required when using the openai embedding provider\nSuggestion: Set OPENAI_API_KEY")]
    MissingOpenAiKey,

    #[error("OpenAI embedding model is required when using the openai embedding provider")]
    MissingOpenAiModel,

    #[error("Local embedding server URL is required when using the local provider\nSuggestion: Set LOCAL_EMBEDDING_URL")]
    MissingLocalUrl,

    #[error("Local embedding timeout must be positive")]
    NonPositiveTimeout,

    #[error("Hugging Face model id is required when using the huggingface provider\nSuggestion: Set HUGGINGFACE_MODEL_ID")]
    MissingHuggingFaceModel,

    #[error("Hugging Face max length must be positive")]
    NonPositiveMaxLength,

    #[error("Hugging Face batch size must be positive")]
    NonPositiveBatchSize,
}

impl Config {
    /// Loads configuration from the environment and validates it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(provider) = read_var("EMBEDDING_PROVIDER") {
            config.embedding.provider = EmbeddingProvider::parse(&provider)?;
        }

        if let Some(api_key) = read_var("OPENAI_API_KEY") {
            config.embedding.openai.api_key = api_key;
        }
        if let Some(model) = read_var("OPENAI_EMBEDDING_MODEL") {
            config.embedding.openai.model = model;
        }
        if let Some(model) = read_var("OPENAI_COMPLETION_MODEL") {
            config.embedding.completion_model = model;
        }

        if let Some(url) = read_var("LOCAL_EMBEDDING_URL") {
            config.embedding.local.server_url = url;
        }
        if let Some(model) = read_var("LOCAL_EMBEDDING_MODEL") {
            config.embedding.local.model_name = model;
        }
        if let Some(dialect) = read_var("LOCAL_EMBEDDING_SERVER_TYPE") {
            config.embedding.local.dialect = LocalDialect::parse(&dialect)?;
        }
        if let Some(timeout) = read_var("LOCAL_EMBEDDING_TIMEOUT") {
            config.embedding.local.timeout_secs =
                parse_positive("LOCAL_EMBEDDING_TIMEOUT", &timeout)?;
        }

        if let Some(model_id) = read_var("HUGGINGFACE_MODEL_ID") {
            config.embedding.huggingface.model_id = model_id;
        }
        if let Some(cache_dir) = read_var("HUGGINGFACE_CACHE_DIR") {
            config.embedding.huggingface.cache_dir = PathBuf::from(cache_dir);
        }
        if let Some(use_gpu) = read_var("HUGGINGFACE_USE_GPU") {
            config.embedding.huggingface.use_gpu = parse_bool("HUGGINGFACE_USE_GPU", &use_gpu)?;
        }
        if let Some(max_length) = read_var("HUGGINGFACE_MAX_LENGTH") {
            config.embedding.huggingface.max_length =
                parse_positive("HUGGINGFACE_MAX_LENGTH", &max_length)? as usize;
        }
        if let Some(batch_size) = read_var("HUGGINGFACE_BATCH_SIZE") {
            config.embedding.huggingface.batch_size =
                parse_positive("HUGGINGFACE_BATCH_SIZE", &batch_size)? as usize;
        }

        if let Some(dimensions) = read_var("EMBEDDING_DIMENSIONS") {
            config.embedding.dimensions =
                dimensions
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber {
                        variable: "EMBEDDING_DIMENSIONS",
                        value: dimensions,
                    })?;
        }

        if let Some(files) = read_var("EXCLUDED_FILES") {
            config.excluded_files = split_list(&files);
        }
        if let Some(extensions) = read_var("EXCLUDED_EXTENSIONS") {
            config.excluded_extensions = split_list(&extensions);
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks provider-specific required fields and numeric bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.embedding.provider {
            EmbeddingProvider::OpenAi => {
                if self.embedding.openai.api_key.is_empty() {
                    return Err(ConfigError::MissingOpenAiKey);
                }
                if self.embedding.openai.model.is_empty() {
                    return Err(ConfigError::MissingOpenAiModel);
                }
            }
            EmbeddingProvider::Local => {
                if self.embedding.local.server_url.is_empty() {
                    return Err(ConfigError::MissingLocalUrl);
                }
                if self.embedding.local.timeout_secs == 0 {
                    return Err(ConfigError::NonPositiveTimeout);
                }
            }
            EmbeddingProvider::HuggingFace => {
                if self.embedding.huggingface.model_id.is_empty() {
                    return Err(ConfigError::MissingHuggingFaceModel);
                }
                if self.embedding.huggingface.max_length == 0 {
                    return Err(ConfigError::NonPositiveMaxLength);
                }
                if self.embedding.huggingface.batch_size == 0 {
                    return Err(ConfigError::NonPositiveBatchSize);
                }
            }
        }
        Ok(())
    }
}

/// Reads a variable, treating unset and empty as absent.
fn read_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_positive(variable: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::InvalidNumber {
            variable,
            value: value.to_string(),
        }),
    }
}

fn parse_bool(variable: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            variable,
            value: value.to_string(),
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.embedding.provider, EmbeddingProvider::OpenAi);
        assert_eq!(config.embedding.openai.model, "text-embedding-3-small");
        assert_eq!(config.embedding.local.server_url, "http://localhost:8080");
        assert_eq!(config.embedding.local.timeout_secs, 30);
        assert_eq!(config.embedding.local.dialect, LocalDialect::Tei);
        assert_eq!(config.embedding.huggingface.max_length, 512);
        assert_eq!(config.embedding.dimensions, 0);
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!(
            EmbeddingProvider::parse("OpenAI").unwrap(),
            EmbeddingProvider::OpenAi
        );
        assert_eq!(
            EmbeddingProvider::parse("local").unwrap(),
            EmbeddingProvider::Local
        );
        assert!(matches!(
            EmbeddingProvider::parse("azure"),
            Err(ConfigError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn test_dialect_parsing() {
        assert_eq!(LocalDialect::parse("TEI").unwrap(), LocalDialect::Tei);
        assert_eq!(LocalDialect::parse("ollama").unwrap(), LocalDialect::Ollama);
        assert!(matches!(
            LocalDialect::parse("vllm"),
            Err(ConfigError::UnknownDialect { .. })
        ));
    }

    #[test]
    fn test_openai_provider_requires_api_key() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingOpenAiKey)
        ));

        let mut config = Config::default();
        config.embedding.openai.api_key = "sk-test".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_local_provider_validation() {
        let mut config = Config::default();
        config.embedding.provider = EmbeddingProvider::Local;
        assert!(config.validate().is_ok());

        config.embedding.local.server_url = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingLocalUrl)
        ));

        config.embedding.local.server_url = default_local_server_url();
        config.embedding.local.timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveTimeout)
        ));
    }

    #[test]
    fn test_huggingface_provider_validation() {
        let mut config = Config::default();
        config.embedding.provider = EmbeddingProvider::HuggingFace;
        assert!(config.validate().is_ok());

        config.embedding.huggingface.max_length = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveMaxLength)
        ));

        config.embedding.huggingface.max_length = 512;
        config.embedding.huggingface.model_id = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingHuggingFaceModel)
        ));
    }

    #[test]
    fn test_parse_positive_rejects_zero_and_garbage() {
        assert_eq!(parse_positive("X", "30").unwrap(), 30);
        assert!(parse_positive("X", "0").is_err());
        assert!(parse_positive("X", "-5").is_err());
        assert!(parse_positive("X", "soon").is_err());
    }

    #[test]
    fn test_split_list_trims_and_drops_empties() {
        assert_eq!(
            split_list("a.txt, b.txt ,,c.txt"),
            vec!["a.txt", "b.txt", "c.txt"]
        );
        assert!(split_list("").is_empty());
    }
}
