//! Embedding generation for records and queries.
//!
//! Vectors come from the external inference backend. Whatever length the
//! backend returns is truncated or zero-padded to the store dimension and
//! L2-normalised, so every stored and query vector lives on the unit sphere.

use std::sync::Arc;

use super::error::KnowledgeError;
use super::models::Record;
use super::records::RecordStore;
use crate::config::{DEFAULT_EMBED_CODE_CHARS, DEFAULT_MAX_EMBED_INPUT_CHARS};
use crate::llm::InferenceBackend;

/// Placeholder the scrapers leave when no snippet was found.
pub const NO_CODE_PLACEHOLDER: &str = "// No code extracted";

/// L2-normalise a vector. The zero vector is returned unchanged.
pub fn normalize(vector: &[f32]) -> Vec<f32> {
    let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if magnitude == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / magnitude).collect()
}

/// Truncate or zero-pad a vector to `dimension`.
pub fn fit_to_dim(mut vector: Vec<f32>, dimension: usize) -> Vec<f32> {
    vector.resize(dimension, 0.0);
    vector
}

/// First `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Text representation of a record used for its embedding.
///
/// `[category] C# version: name - description Code: snippet`
pub fn embed_record_text(record: &Record, code_chars: usize) -> String {
    let mut parts = vec![
        format!("[{}]", record.category),
        format!("C# {}:", record.language_version),
        record.feature_name.clone(),
    ];

    if !record.description.is_empty() {
        parts.push(format!("- {}", record.description));
    }
    if !record.code_snippet.is_empty() && record.code_snippet != NO_CODE_PLACEHOLDER {
        parts.push(format!(
            "Code: {}",
            truncate_chars(&record.code_snippet, code_chars)
        ));
    }

    parts.join(" ")
}

/// Produces store-ready vectors through an inference backend.
pub struct Embedder {
    backend: Arc<dyn InferenceBackend>,
    dimension: usize,
    max_input_chars: usize,
    code_chars: usize,
}

impl Embedder {
    pub fn new(backend: Arc<dyn InferenceBackend>, dimension: usize) -> Self {
        Self {
            backend,
            dimension,
            max_input_chars: DEFAULT_MAX_EMBED_INPUT_CHARS,
            code_chars: DEFAULT_EMBED_CODE_CHARS,
        }
    }

    /// Override input caps: characters sent to the backend, and characters
    /// of code included in a record's text.
    pub fn with_limits(mut self, max_input_chars: usize, code_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self.code_chars = code_chars;
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed arbitrary text into a normalised vector of the store dimension.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, KnowledgeError> {
        let input = truncate_chars(text, self.max_input_chars);
        let raw = self.backend.embed(input).await?;
        if raw.is_empty() {
            return Err(KnowledgeError::Embedding("backend returned an empty vector".to_string()));
        }
        Ok(normalize(&fit_to_dim(raw, self.dimension)))
    }

    /// Embed a single record.
    pub async fn embed_record(&self, record: &Record) -> Result<Vec<f32>, KnowledgeError> {
        self.embed_text(&embed_record_text(record, self.code_chars)).await
    }

    /// Embed and store vectors for `records`. Failures are logged and
    /// skipped. Returns the number stored.
    pub async fn embed_records(&self, store: &RecordStore, records: &[Record]) -> usize {
        let mut stored = 0;

        for record in records {
            let vector = match self.embed_record(record).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(record_id = %record.id, error = %e, "embedding failed, skipping");
                    continue;
                }
            };

            match store.store_embedding(&record.id, &vector).await {
                Ok(()) => stored += 1,
                Err(e) => {
                    tracing::warn!(record_id = %record.id, error = %e, "failed to store embedding")
                }
            }
        }

        stored
    }

    /// Embed every record that has no vector yet, `window` ids at a time.
    ///
    /// Stops when nothing is pending or a whole window fails. Returns the
    /// number of vectors stored.
    pub async fn embed_pending(
        &self,
        store: &RecordStore,
        window: usize,
    ) -> Result<usize, KnowledgeError> {
        let window = window.max(1);
        let mut total = 0;

        loop {
            let ids = store.ids_without_embedding(window).await?;
            if ids.is_empty() {
                break;
            }

            let mut records = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(record) = store.get(id).await? {
                    records.push(record);
                }
            }

            let stored = self.embed_records(store, &records).await;
            total += stored;
            tracing::info!("embedded {} records ({} this window)", total, stored);

            if stored == 0 {
                tracing::warn!(pending = ids.len(), "no embeddings stored in window, stopping");
                break;
            }
        }

        Ok(total)
    }
}
