//! Configuration management for Sovereign Memory.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `sovereign.toml` file
//! 3. User config `~/.config/sovereign/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,

    /// Embedding configuration.
    pub embedding: EmbeddingConfig,

    /// LLM provider configuration.
    pub llm: LLMConfig,

    /// Hybrid retrieval configuration.
    pub retrieval: RetrievalConfig,

    /// Bulk ingestion configuration.
    pub ingest: IngestConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./sovereign.toml` (project local)
    /// 2. `~/.config/sovereign/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new("sovereign.toml").exists() {
            return Self::from_file("sovereign.toml");
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("sovereign").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Reject values the stores cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimension must be greater than zero".to_string(),
            ));
        }
        if self.ingest.batch_window == 0 {
            return Err(ConfigError::Invalid(
                "ingest.batch_window must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("SOVEREIGN_LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("SOVEREIGN_LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Ok(model) = std::env::var("SOVEREIGN_EMBEDDING_MODEL") {
            self.llm.embedding_model = Some(model);
        }
        if let Ok(url) = std::env::var("SOVEREIGN_LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Ok(key) = std::env::var("SOVEREIGN_LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(tokens) = std::env::var("SOVEREIGN_LLM_MAX_TOKENS") {
            if let Ok(n) = tokens.parse() {
                self.llm.max_tokens = n;
            }
        }

        if let Ok(dim) = std::env::var("SOVEREIGN_EMBEDDING_DIM") {
            if let Ok(n) = dim.parse() {
                self.embedding.dimension = n;
            }
        }

        if let Ok(dir) = std::env::var("SOVEREIGN_DATA_DIR") {
            self.storage.data_dir = dir;
        }
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for persisted data (default: ".sovereign").
    pub data_dir: String,

    /// Embedded database directory name inside `data_dir`.
    pub db_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            db_file: DEFAULT_DB_FILE.to_string(),
        }
    }
}

impl StorageConfig {
    /// Full path of the embedded database.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.db_file)
    }
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Vector length stored for every record. Fixed once the store exists.
    pub dimension: usize,

    /// Input cap applied before calling the embedding endpoint.
    pub max_input_chars: usize,

    /// Characters of code folded into a record's embedding text.
    pub code_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_EMBEDDING_DIM,
            max_input_chars: DEFAULT_MAX_EMBED_INPUT_CHARS,
            code_chars: DEFAULT_EMBED_CODE_CHARS,
        }
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    /// Provider name: "openai" or "ollama".
    pub provider: String,

    /// Chat model name (provider-specific).
    pub model: Option<String>,

    /// Embedding model name (provider-specific).
    pub embedding_model: Option<String>,

    /// Base URL for API (for openai-compatible providers).
    pub base_url: Option<String>,

    /// API key (can also be set via environment variable).
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Maximum tokens for response.
    pub max_tokens: u32,

    /// Sampling temperature for answers.
    pub temperature: f32,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_LLM_PROVIDER.to_string(),
            model: None,
            embedding_model: None,
            base_url: None,
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl LLMConfig {
    /// Get the chat model name, falling back to provider defaults.
    pub fn model_or_default(&self) -> String {
        self.model.clone().unwrap_or_else(|| match self.provider.as_str() {
            "ollama" => DEFAULT_OLLAMA_MODEL.to_string(),
            _ => DEFAULT_OPENAI_MODEL.to_string(),
        })
    }

    /// Get the embedding model name, falling back to provider defaults.
    pub fn embedding_model_or_default(&self) -> String {
        self.embedding_model
            .clone()
            .unwrap_or_else(|| match self.provider.as_str() {
                "ollama" => DEFAULT_OLLAMA_EMBEDDING_MODEL.to_string(),
                _ => DEFAULT_OPENAI_EMBEDDING_MODEL.to_string(),
            })
    }

    /// Get the base URL, falling back to provider defaults.
    pub fn base_url_or_default(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| match self.provider.as_str() {
                "ollama" => DEFAULT_OLLAMA_URL.to_string(),
                _ => DEFAULT_OPENAI_URL.to_string(),
            })
    }

    /// Get API key from config or environment.
    pub fn api_key_or_env(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("SOVEREIGN_LLM_API_KEY").ok())
            .or_else(|| match self.provider.as_str() {
                "ollama" => None,
                _ => std::env::var("OPENAI_API_KEY").ok(),
            })
    }
}

/// Hybrid retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Nearest records fetched by similarity search.
    pub top_k: usize,

    /// Breadth-first expansion depth.
    pub max_hops: usize,

    /// Neighbors fetched per frontier node and hop.
    pub max_neighbors_per_hop: usize,

    /// Character budget of the formatted context.
    pub max_chars: usize,

    /// Code characters shown per result before truncation.
    pub code_preview_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_hops: DEFAULT_MAX_HOPS,
            max_neighbors_per_hop: DEFAULT_MAX_NEIGHBORS_PER_HOP,
            max_chars: DEFAULT_CONTEXT_MAX_CHARS,
            code_preview_chars: DEFAULT_CODE_PREVIEW_CHARS,
        }
    }
}

/// Bulk ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Rows per committed window in bulk writes.
    pub batch_window: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_window: DEFAULT_BATCH_WINDOW,
        }
    }
}
