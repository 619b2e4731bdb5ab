//! Inference capability: text embeddings and chat completion.
//!
//! The knowledge core depends on exactly two operations, expressed by
//! [`InferenceBackend`]: `embed(text)` and `complete(messages, ..)`.
//! [`InferenceEngine`] wraps a backend in an explicit handle that is opened
//! once, shared by reference, and closed on shutdown.

mod error;
mod openai;
mod prompts;
mod provider;

pub use error::LLMError;
pub use openai::OpenAIClient;
pub use prompts::{build_chat_messages, CHAT_SYSTEM_PROMPT, CHAT_SYSTEM_PROMPT_NO_CONTEXT, MAX_HISTORY_MESSAGES};
pub use provider::Provider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The external inference capability.
///
/// Calls are made synchronously from the caller's point of view and carry no
/// internal timeout; wrap them in `tokio::time::timeout` when a bound is needed.
/// Callers are responsible for capping embedding input length.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Map text to a vector. Length is backend-specific.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError>;

    /// Run a chat completion and return the response text.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LLMError>;
}

#[async_trait]
impl InferenceBackend for Box<dyn InferenceBackend> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError> {
        (**self).embed(text).await
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LLMError> {
        (**self).complete(messages, max_tokens, temperature).await
    }
}

/// Explicit lifecycle handle around a backend.
///
/// Loaded once with [`InferenceEngine::open`], passed as `Arc` to the
/// components that need it, released with [`InferenceEngine::close`].
/// Calls after close fail with [`LLMError::EngineClosed`].
pub struct InferenceEngine {
    backend: RwLock<Option<Arc<dyn InferenceBackend>>>,
}

impl InferenceEngine {
    /// Open a handle over an already constructed backend.
    pub fn open(backend: impl InferenceBackend + 'static) -> Arc<Self> {
        Arc::new(Self {
            backend: RwLock::new(Some(Arc::new(backend))),
        })
    }

    /// Open a handle from the provider configuration.
    pub fn from_provider(provider: Provider) -> Result<Arc<Self>, LLMError> {
        let backend = provider.build()?;
        Ok(Self::open(backend))
    }

    /// Release the backend. Idempotent.
    pub async fn close(&self) {
        let released = self.backend.write().await.take();
        if released.is_some() {
            tracing::info!("inference engine closed");
        }
    }

    pub async fn is_open(&self) -> bool {
        self.backend.read().await.is_some()
    }

    async fn current(&self) -> Result<Arc<dyn InferenceBackend>, LLMError> {
        self.backend
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(LLMError::EngineClosed)
    }
}

#[async_trait]
impl InferenceBackend for InferenceEngine {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError> {
        let backend = self.current().await?;
        backend.embed(text).await
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LLMError> {
        let backend = self.current().await?;
        backend.complete(messages, max_tokens, temperature).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl InferenceBackend for Echo {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError> {
            Ok(vec![text.len() as f32])
        }

        async fn complete(
            &self,
            messages: &[ChatMessage],
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<String, LLMError> {
            Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_engine_delegates_while_open() {
        let engine = InferenceEngine::open(Echo);
        assert!(engine.is_open().await);
        assert_eq!(engine.embed("abcd").await.unwrap(), vec![4.0]);

        let reply = engine
            .complete(&[ChatMessage::user("hi")], 16, 0.0)
            .await
            .unwrap();
        assert_eq!(reply, "hi");
    }

    #[tokio::test]
    async fn test_engine_rejects_after_close() {
        let engine = InferenceEngine::open(Echo);
        engine.close().await;
        engine.close().await;

        assert!(!engine.is_open().await);
        assert!(matches!(
            engine.embed("x").await,
            Err(LLMError::EngineClosed)
        ));
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&ChatMessage::system("s")).unwrap();
        assert!(json.contains("\"role\":\"system\""));
    }
}
