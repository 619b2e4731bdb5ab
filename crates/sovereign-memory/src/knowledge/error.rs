//! Knowledge store error types.

use thiserror::Error;

use crate::llm::LLMError;

/// Errors that can occur in the record store, graph store, or retriever.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// Embedding generation error.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Chat completion failed.
    #[error("Inference error: {0}")]
    Inference(String),

    /// Vector length does not match the store dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Record failed field validation.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Record or node not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Property bag (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<surrealdb::Error> for KnowledgeError {
    fn from(err: surrealdb::Error) -> Self {
        KnowledgeError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for KnowledgeError {
    fn from(err: serde_json::Error) -> Self {
        KnowledgeError::Serialization(err.to_string())
    }
}

impl From<LLMError> for KnowledgeError {
    fn from(err: LLMError) -> Self {
        KnowledgeError::Embedding(err.to_string())
    }
}
