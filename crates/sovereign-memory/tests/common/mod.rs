#![allow(dead_code)]

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

use sovereign_memory::knowledge::{
    Category, GraphStore, KnowledgeDb, LanguageVersion, Record, RecordStore, RuntimeVersion,
};
use sovereign_memory::llm::{ChatMessage, InferenceBackend, LLMError};

pub const DIM: usize = 16;

/// Deterministic embeddings: equal text gives equal vectors.
pub struct HashBackend {
    pub dimension: usize,
}

impl HashBackend {
    pub fn new() -> Self {
        Self { dimension: DIM }
    }
}

#[async_trait]
impl InferenceBackend for HashBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LLMError> {
        let mut vector = Vec::with_capacity(self.dimension);
        let mut round = 0u32;
        while vector.len() < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(round.to_le_bytes());
            hasher.update(text.as_bytes());
            for byte in hasher.finalize() {
                if vector.len() == self.dimension {
                    break;
                }
                vector.push(byte as f32 / 127.5 - 1.0);
            }
            round += 1;
        }
        Ok(vector)
    }

    /// Echoes the system prompt so tests can inspect the injected context.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, LLMError> {
        Ok(messages
            .first()
            .map(|m| m.content.clone())
            .unwrap_or_default())
    }
}

/// Fails every call.
pub struct FailingBackend;

#[async_trait]
impl InferenceBackend for FailingBackend {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LLMError> {
        Err(LLMError::Network("connection refused".to_string()))
    }

    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, LLMError> {
        Err(LLMError::Network("connection refused".to_string()))
    }
}

pub async fn open_db(dir: &Path) -> Arc<KnowledgeDb> {
    Arc::new(KnowledgeDb::open(&dir.join("db"), DIM).await.unwrap())
}

pub async fn open_stores(dir: &Path) -> (Arc<KnowledgeDb>, Arc<RecordStore>, Arc<GraphStore>) {
    let db = open_db(dir).await;
    let records = Arc::new(RecordStore::new(Arc::clone(&db)));
    let graph = Arc::new(GraphStore::new(Arc::clone(&db)));
    (db, records, graph)
}

pub fn language_record(version: LanguageVersion, name: &str) -> Record {
    Record::new(Category::Language, version, RuntimeVersion::Net8_0, name)
        .with_description(format!("{name} description"))
}

/// Unit vector along `axis`.
pub fn axis(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[axis] = 1.0;
    v
}
