use crate::config::{
    LLMConfig, DEFAULT_OLLAMA_EMBEDDING_MODEL, DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL,
    DEFAULT_OPENAI_EMBEDDING_MODEL, DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_URL,
};
use super::{InferenceBackend, LLMError, OpenAIClient};

/// Inference provider configuration.
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI-compatible endpoint (default, most universal)
    OpenAI {
        base_url: Option<String>,
        api_key: Option<String>,
        model: Option<String>,
        embedding_model: Option<String>,
    },
    /// Local Ollama instance
    Ollama {
        base_url: Option<String>,
        model: String,
        embedding_model: String,
    },
}

impl Default for Provider {
    fn default() -> Self {
        Provider::OpenAI {
            base_url: None,
            api_key: None,
            model: None,
            embedding_model: None,
        }
    }
}

impl Provider {
    /// Creates a provider from LLMConfig.
    pub fn from_config(config: &LLMConfig) -> Self {
        match config.provider.as_str() {
            "ollama" => Provider::Ollama {
                base_url: config.base_url.clone(),
                model: config.model_or_default(),
                embedding_model: config.embedding_model_or_default(),
            },
            _ => Provider::OpenAI {
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
                model: config.model.clone(),
                embedding_model: config.embedding_model.clone(),
            },
        }
    }

    /// Creates a backend from the provider configuration.
    pub fn build(self) -> Result<Box<dyn InferenceBackend>, LLMError> {
        match self {
            Provider::OpenAI {
                base_url,
                api_key,
                model,
                embedding_model,
            } => {
                let base = base_url
                    .or_else(|| std::env::var("SOVEREIGN_LLM_BASE_URL").ok())
                    .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
                    .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());

                let key = api_key
                    .or_else(|| std::env::var("SOVEREIGN_LLM_API_KEY").ok())
                    .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                    .unwrap_or_default();

                let mdl = model
                    .or_else(|| std::env::var("SOVEREIGN_LLM_MODEL").ok())
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

                let embed_mdl = embedding_model
                    .or_else(|| std::env::var("SOVEREIGN_EMBEDDING_MODEL").ok())
                    .unwrap_or_else(|| DEFAULT_OPENAI_EMBEDDING_MODEL.to_string());

                Ok(Box::new(OpenAIClient::new(base, key, mdl, embed_mdl)))
            }

            Provider::Ollama {
                base_url,
                model,
                embedding_model,
            } => {
                let base = base_url
                    .or_else(|| {
                        std::env::var("OLLAMA_HOST")
                            .ok()
                            .map(|h| format!("{}/v1", h.trim_end_matches('/')))
                    })
                    .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

                Ok(Box::new(OpenAIClient::new(base, "", model, embedding_model)))
            }
        }
    }

    /// Auto-detect provider from environment variables.
    ///
    /// Detection order:
    /// 1. SOVEREIGN_LLM_PROVIDER explicitly set
    /// 2. OPENAI_API_KEY set → OpenAI
    /// 3. OLLAMA_HOST set → Ollama
    /// 4. Default to OpenAI-compatible (works with local servers too)
    pub fn from_env() -> Result<Box<dyn InferenceBackend>, LLMError> {
        if let Ok(provider) = std::env::var("SOVEREIGN_LLM_PROVIDER") {
            return match provider.to_lowercase().as_str() {
                "openai" => Provider::default().build(),
                "ollama" => Self::ollama_from_env().build(),
                other => Err(LLMError::UnknownProvider(other.to_string())),
            };
        }

        if std::env::var("OPENAI_API_KEY").is_ok() {
            return Provider::default().build();
        }

        if std::env::var("OLLAMA_HOST").is_ok() {
            return Self::ollama_from_env().build();
        }

        Provider::default().build()
    }

    fn ollama_from_env() -> Self {
        Provider::Ollama {
            base_url: None,
            model: std::env::var("SOVEREIGN_LLM_MODEL")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_MODEL.to_string()),
            embedding_model: std::env::var("SOVEREIGN_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_EMBEDDING_MODEL.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_provider() {
        let provider = Provider::default();
        assert!(matches!(provider, Provider::OpenAI { .. }));
    }

    #[test]
    fn test_ollama_provider_build() {
        let provider = Provider::Ollama {
            base_url: None,
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            embedding_model: DEFAULT_OLLAMA_EMBEDDING_MODEL.to_string(),
        };
        // Should succeed without API key
        assert!(provider.build().is_ok());
    }

    #[test]
    fn test_openai_provider_build() {
        let provider = Provider::OpenAI {
            base_url: Some("http://localhost:8080/v1".to_string()),
            api_key: Some("test".to_string()),
            model: Some("local-model".to_string()),
            embedding_model: Some("local-embed".to_string()),
        };
        assert!(provider.build().is_ok());
    }

    #[test]
    fn test_from_config() {
        let config = LLMConfig {
            provider: "ollama".to_string(),
            model: Some("codellama".to_string()),
            ..Default::default()
        };

        let provider = Provider::from_config(&config);
        assert!(matches!(
            provider,
            Provider::Ollama { model, embedding_model, .. }
                if model == "codellama" && embedding_model == DEFAULT_OLLAMA_EMBEDDING_MODEL
        ));
    }
}
