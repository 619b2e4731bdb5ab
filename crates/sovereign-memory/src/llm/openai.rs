use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, InferenceBackend, LLMError};
use crate::config::{DEFAULT_OLLAMA_URL, DEFAULT_OPENAI_URL};

/// OpenAI-compatible API client.
///
/// Uses `/chat/completions` for answers and `/embeddings` for vectors, so it
/// works with OpenAI itself and with local servers that mirror the API:
/// - Ollama (http://localhost:11434/v1)
/// - llama.cpp server
/// - vLLM
/// - LM Studio
pub struct OpenAIClient {
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    client: Client,
}

impl OpenAIClient {
    /// Creates a new OpenAI-compatible client.
    ///
    /// # Arguments
    /// * `base_url` - The API base URL (e.g., "https://api.openai.com/v1")
    /// * `api_key` - The API key (can be empty for local providers like Ollama)
    /// * `model` - The chat model name
    /// * `embedding_model` - The embedding model name
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: embedding_model.into(),
            client: Client::new(),
        }
    }

    /// Creates a client for OpenAI.
    pub fn openai(
        api_key: impl Into<String>,
        model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self::new(DEFAULT_OPENAI_URL, api_key, model, embedding_model)
    }

    /// Creates a client for Ollama (local).
    pub fn ollama(model: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        Self::new(DEFAULT_OLLAMA_URL, "", model, embedding_model)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);

        let mut req = self
            .client
            .post(&url)
            .header("content-type", "application/json");

        // Only add authorization if api_key is not empty
        if !self.api_key.is_empty() {
            req = req.header("authorization", format!("Bearer {}", self.api_key));
        }
        req
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LLMError> {
        let status = response.status();

        if status == 429 {
            return Err(LLMError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl InferenceBackend for OpenAIClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };

        let response = self.post("embeddings").json(&request).send().await?;
        let response = Self::check_status(response).await?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or(LLMError::EmptyEmbedding)
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LLMError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: Some(max_tokens),
            temperature: Some(temperature),
        };

        let response = self.post("chat/completions").json(&request).send().await?;
        let response = Self::check_status(response).await?;

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        // Extract content from first choice
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OpenAIClient::new(
            "https://api.example.com/v1",
            "test-key",
            "gpt-4",
            "embed-small",
        );
        assert_eq!(client.base_url, "https://api.example.com/v1");
        assert_eq!(client.model, "gpt-4");
        assert_eq!(client.embedding_model, "embed-small");
    }

    #[test]
    fn test_ollama_client() {
        let client = OpenAIClient::ollama("phi4", "nomic-embed-text");
        assert_eq!(client.base_url, "http://localhost:11434/v1");
        assert_eq!(client.model, "phi4");
        assert!(client.api_key.is_empty());
    }

    #[test]
    fn test_url_trailing_slash_removed() {
        let client = OpenAIClient::new("https://api.example.com/v1/", "key", "model", "embed");
        assert_eq!(client.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn test_chat_request_shape() {
        let messages = [ChatMessage::user("hello")];
        let request = ChatRequest {
            model: "m",
            messages: &messages,
            max_tokens: Some(64),
            temperature: Some(0.1),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 64);
    }

    #[test]
    fn test_embedding_response_parse() {
        let body = r#"{"data":[{"embedding":[0.5,-0.25],"index":0}],"model":"m"}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.5, -0.25]);
    }
}
