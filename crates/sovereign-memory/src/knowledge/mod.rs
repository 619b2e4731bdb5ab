//! Hybrid knowledge store for C#/.NET feature records.
//!
//! Two logical stores share one embedded database:
//! - **Records + embeddings**, keyed by record id, with a vector dimension
//!   fixed when the store is created
//! - **Graph**: typed nodes keyed by canonical id and typed, weighted edges
//!   keyed by their (source, target, relation) triple
//!
//! # Components
//!
//! - [`RecordStore`] - record persistence and nearest-neighbour search
//! - [`GraphStore`] - node/edge persistence, batch mode, bounded expansion
//! - [`GraphBuilder`] - canonical ids, seed topology, per-record edges
//! - [`HybridRetriever`] - similarity search expanded through the graph
//! - [`KnowledgeBase`] - facade implementing [`KnowledgeStore`]
//!
//! # Example
//!
//! ```ignore
//! use sovereign_memory::config::Config;
//! use sovereign_memory::knowledge::{KnowledgeBase, KnowledgeStore};
//! use sovereign_memory::llm::{InferenceEngine, Provider};
//!
//! let config = Config::load()?;
//! let engine = InferenceEngine::from_provider(Provider::from_config(&config.llm))?;
//! let kb = KnowledgeBase::open(&config, engine).await?;
//!
//! kb.ingest(&records, true).await?;
//! let context = kb.retrieve("pattern matching on records").await;
//! println!("{}", context.format(3000));
//! ```

mod builder;
mod db;
mod embedder;
mod error;
mod graph;
pub mod models;
mod ontology;
mod records;
mod retriever;

pub use builder::{
    category_node_id, feature_node_id, language_node_id, package_node_id, runtime_node_id,
    BuildStats, GraphBuilder, SeedCounts, EVOLUTION_WEIGHT, FRAMEWORK_DEPENDENCY_WEIGHT,
};
pub use db::KnowledgeDb;
pub use embedder::{embed_record_text, fit_to_dim, normalize, Embedder, NO_CODE_PLACEHOLDER};
pub use error::KnowledgeError;
pub use graph::GraphStore;
pub use models::{
    compute_coverage, Category, CoverageEntry, CoverageMatrix, GraphStats, LanguageVersion,
    Record, RecordStats, RuntimeVersion, StoreStats, ValidationStatus,
};
pub use ontology::{Edge, Node, NodeType, Relation, TraversalResult, DEFAULT_EDGE_WEIGHT};
pub use records::{RecordFilter, RecordStore};
pub use retriever::{HybridRetriever, Origin, RagContext, RagResult, GRAPH_RESULT_SCORE};

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, RetrievalConfig};
use crate::llm::{build_chat_messages, ChatMessage, InferenceBackend, InferenceEngine};

/// Outcome of [`KnowledgeStore::ingest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Records written to the record store.
    pub inserted: usize,
    /// Graph edges created for the new feature nodes.
    pub edges: usize,
    /// Embeddings stored.
    pub embedded: usize,
}

/// Main interface for the knowledge base.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Store records, link them into the graph and optionally embed them.
    async fn ingest(&self, records: &[Record], embed: bool) -> Result<IngestStats, KnowledgeError>;

    /// Retrieve context for a query with the configured limits.
    async fn retrieve(&self, query: &str) -> RagContext;

    /// Answer a question with retrieved context injected into the prompt.
    async fn ask(&self, question: &str, history: &[ChatMessage]) -> Result<String, KnowledgeError>;

    /// Counters for both stores.
    async fn stats(&self) -> Result<StoreStats, KnowledgeError>;

    /// Validation coverage per language version and category.
    async fn coverage(&self) -> Result<CoverageMatrix, KnowledgeError>;
}

/// The knowledge base: record store, graph and retriever over one database.
pub struct KnowledgeBase {
    records: Arc<RecordStore>,
    graph: Arc<GraphStore>,
    builder: GraphBuilder,
    embedder: Arc<Embedder>,
    retriever: HybridRetriever,
    engine: Arc<InferenceEngine>,
    retrieval: RetrievalConfig,
    max_tokens: u32,
    temperature: f32,
    batch_window: usize,
}

impl KnowledgeBase {
    /// Open the store at the configured path and seed the graph.
    pub async fn open(config: &Config, engine: Arc<InferenceEngine>) -> Result<Self, KnowledgeError> {
        config
            .validate()
            .map_err(|e| KnowledgeError::Config(e.to_string()))?;

        let path = config.storage.db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| KnowledgeError::Config(format!("{}: {}", parent.display(), e)))?;
        }

        let db = Arc::new(KnowledgeDb::open(&path, config.embedding.dimension).await?);
        let batch_window = config.ingest.batch_window;

        let records = Arc::new(RecordStore::new(Arc::clone(&db)).with_batch_window(batch_window));
        let graph = Arc::new(GraphStore::new(Arc::clone(&db)));
        let builder = GraphBuilder::new(Arc::clone(&graph)).with_batch_window(batch_window);

        let backend: Arc<dyn InferenceBackend> = engine.clone();
        let embedder = Arc::new(
            Embedder::new(backend, config.embedding.dimension)
                .with_limits(config.embedding.max_input_chars, config.embedding.code_chars),
        );
        let retriever = HybridRetriever::new(
            Arc::clone(&records),
            Arc::clone(&graph),
            Arc::clone(&embedder),
        );

        builder.seed().await?;

        tracing::info!(path = %path.display(), "knowledge base opened");
        Ok(Self {
            records,
            graph,
            builder,
            embedder,
            retriever,
            engine,
            retrieval: config.retrieval.clone(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            batch_window,
        })
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    /// Embed every record that has no vector yet.
    pub async fn embed_pending(&self) -> Result<usize, KnowledgeError> {
        self.embedder
            .embed_pending(&self.records, self.batch_window)
            .await
    }

    async fn link_records(&self, records: &[Record]) -> Result<usize, KnowledgeError> {
        let mut edges = 0;
        for (i, record) in records.iter().enumerate() {
            match self.builder.add_record(record).await {
                Ok(created) => edges += created,
                Err(e) => tracing::warn!(record_id = %record.id, error = %e, "failed to link record"),
            }
            if (i + 1) % self.batch_window == 0 {
                self.graph.flush().await?;
            }
        }
        Ok(edges)
    }
}

#[async_trait]
impl KnowledgeStore for KnowledgeBase {
    async fn ingest(&self, records: &[Record], embed: bool) -> Result<IngestStats, KnowledgeError> {
        let inserted = self.records.insert_batch(records).await?;

        let valid: Vec<Record> = records
            .iter()
            .filter(|r| r.validate().is_ok())
            .cloned()
            .collect();

        self.graph.begin_batch().await;
        let linked = self.link_records(&valid).await;
        let ended = self.graph.end_batch().await;
        let edges = linked?;
        ended?;

        let embedded = if embed {
            self.embedder.embed_records(&self.records, &valid).await
        } else {
            0
        };

        tracing::info!(inserted, edges, embedded, "ingest complete");
        Ok(IngestStats {
            inserted,
            edges,
            embedded,
        })
    }

    async fn retrieve(&self, query: &str) -> RagContext {
        self.retriever
            .retrieve(
                query,
                self.retrieval.top_k,
                self.retrieval.max_hops,
                self.retrieval.max_neighbors_per_hop,
            )
            .await
    }

    async fn ask(&self, question: &str, history: &[ChatMessage]) -> Result<String, KnowledgeError> {
        let context = self.retrieve(question).await;
        let rag_context =
            context.format_with(self.retrieval.max_chars, self.retrieval.code_preview_chars);

        let messages = build_chat_messages(question, history, &rag_context);
        self.engine
            .complete(&messages, self.max_tokens, self.temperature)
            .await
            .map_err(|e| KnowledgeError::Inference(e.to_string()))
    }

    async fn stats(&self) -> Result<StoreStats, KnowledgeError> {
        Ok(StoreStats {
            records: self.records.stats().await?,
            graph: self.graph.stats().await?,
            collected_at: Some(chrono::Utc::now()),
        })
    }

    async fn coverage(&self) -> Result<CoverageMatrix, KnowledgeError> {
        let records = self.records.scan(&RecordFilter::default()).await?;
        Ok(compute_coverage(&records))
    }
}
