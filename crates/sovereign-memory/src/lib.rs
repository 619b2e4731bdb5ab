//! Sovereign Memory: hybrid vector + knowledge graph store for C#/.NET
//! feature records, with graph-expanded context retrieval for chat.

pub mod config;
pub mod knowledge;
pub mod llm;

pub use config::Config;
pub use knowledge::{
    HybridRetriever, KnowledgeBase, KnowledgeError, KnowledgeStore, RagContext, Record,
};
pub use llm::{InferenceBackend, InferenceEngine};
