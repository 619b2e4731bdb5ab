//! Graph builder: derives nodes and structural edges from records.
//!
//! Canonical ids:
//!
//! | entity           | id                      |
//! |------------------|-------------------------|
//! | language version | `csharp:{version}`      |
//! | runtime version  | `dotnet:{version}`      |
//! | category         | `framework:{category}`  |
//! | record           | `feature:{record id}`   |
//! | package          | `nuget:{lowercase name}`|

use std::sync::Arc;

use super::error::KnowledgeError;
use super::graph::GraphStore;
use super::models::{Category, LanguageVersion, Record, RuntimeVersion};
use super::ontology::{Edge, Node, NodeType, Relation};
use crate::config::DEFAULT_BATCH_WINDOW;

/// Weight of edges in the language version chain.
pub const EVOLUTION_WEIGHT: f32 = 0.8;
/// Weight of framework dependency edges.
pub const FRAMEWORK_DEPENDENCY_WEIGHT: f32 = 0.9;

/// Fixed framework dependencies, dependent first.
const FRAMEWORK_DEPENDENCIES: [(Category, Category); 5] = [
    (Category::Blazor, Category::Aspnet),
    (Category::MinimalApis, Category::Aspnet),
    (Category::Signalr, Category::Aspnet),
    (Category::Grpc, Category::Aspnet),
    (Category::EfCore, Category::Bcl),
];

pub fn language_node_id(version: LanguageVersion) -> String {
    format!("csharp:{}", version.as_str())
}

pub fn runtime_node_id(version: RuntimeVersion) -> String {
    format!("dotnet:{}", version.as_str())
}

pub fn category_node_id(category: Category) -> String {
    format!("framework:{}", category.as_str())
}

pub fn feature_node_id(record_id: &str) -> String {
    format!("feature:{record_id}")
}

pub fn package_node_id(package: &str) -> String {
    format!("nuget:{}", package.trim().to_lowercase())
}

/// Nodes and edges created by [`GraphBuilder::seed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedCounts {
    pub nodes: usize,
    pub edges: usize,
}

/// Totals from [`GraphBuilder::build_from_records`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub seed_nodes: usize,
    pub seed_edges: usize,
    pub feature_nodes: usize,
    pub feature_edges: usize,
}

/// Writes domain structure into a [`GraphStore`].
pub struct GraphBuilder {
    graph: Arc<GraphStore>,
    batch_window: usize,
}

impl GraphBuilder {
    pub fn new(graph: Arc<GraphStore>) -> Self {
        Self {
            graph,
            batch_window: DEFAULT_BATCH_WINDOW,
        }
    }

    /// Records added between flushes in [`GraphBuilder::build_from_records`].
    pub fn with_batch_window(mut self, window: usize) -> Self {
        self.batch_window = window.max(1);
        self
    }

    pub fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }

    /// Create the version, runtime and framework nodes plus the fixed
    /// evolution and dependency edges. Safe to call repeatedly; existing
    /// nodes and edges are left alone.
    pub async fn seed(&self) -> Result<SeedCounts, KnowledgeError> {
        let mut nodes: Vec<Node> = Vec::new();

        for version in LanguageVersion::ALL {
            nodes.push(
                Node::new(
                    language_node_id(version),
                    NodeType::LanguageVersion,
                    format!("C# {}", version.as_str()),
                )
                .with_property("version", version.as_str()),
            );
        }
        for version in RuntimeVersion::ALL {
            nodes.push(
                Node::new(runtime_node_id(version), NodeType::RuntimeVersion, version.as_str())
                    .with_property("version", version.as_str()),
            );
        }
        for category in Category::ALL {
            nodes.push(
                Node::new(
                    category_node_id(category),
                    NodeType::Framework,
                    category.display_name(),
                )
                .with_property("category", category.as_str()),
            );
        }

        let created_nodes = self.graph.upsert_nodes_batch(&nodes).await?;

        let mut edges: Vec<Edge> = LanguageVersion::ALL
            .windows(2)
            .map(|pair| {
                Edge::new(
                    language_node_id(pair[0]),
                    language_node_id(pair[1]),
                    Relation::EvolvedInto,
                )
                .with_weight(EVOLUTION_WEIGHT)
            })
            .collect();
        edges.extend(FRAMEWORK_DEPENDENCIES.iter().map(|(from, to)| {
            Edge::new(category_node_id(*from), category_node_id(*to), Relation::DependsOn)
                .with_weight(FRAMEWORK_DEPENDENCY_WEIGHT)
        }));

        let created_edges = self.graph.upsert_edges_batch(&edges).await?;

        tracing::info!(
            nodes = created_nodes,
            edges = created_edges,
            "graph seed complete"
        );
        Ok(SeedCounts {
            nodes: created_nodes,
            edges: created_edges,
        })
    }

    /// Add the feature node for `record` with its structural edges.
    /// Returns the number of edges created.
    pub async fn add_record(&self, record: &Record) -> Result<usize, KnowledgeError> {
        if record.id.is_empty() {
            return Err(KnowledgeError::InvalidRecord("record with empty id".to_string()));
        }

        let feature_id = feature_node_id(&record.id);
        let feature = Node::new(&feature_id, NodeType::Feature, &record.feature_name)
            .with_property("category", record.category.as_str())
            .with_property("csharp_version", record.language_version.as_str())
            .with_property("dotnet_version", record.runtime_version.as_str())
            .with_property("validation_status", record.validation_status.as_str());
        self.graph.upsert_node(&feature).await?;

        let mut edges = vec![
            Edge::new(
                &feature_id,
                language_node_id(record.language_version),
                Relation::IntroducedIn,
            ),
            Edge::new(
                &feature_id,
                runtime_node_id(record.runtime_version),
                Relation::RequiresRuntime,
            ),
            Edge::new(&feature_id, category_node_id(record.category), Relation::PartOf),
        ];

        let packages: Vec<&str> = record
            .packages
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();
        if !packages.is_empty() {
            let package_nodes: Vec<Node> = packages
                .iter()
                .map(|p| Node::new(package_node_id(p), NodeType::Package, *p))
                .collect();
            self.graph.upsert_nodes_batch(&package_nodes).await?;

            edges.extend(
                packages
                    .iter()
                    .map(|p| Edge::new(&feature_id, package_node_id(p), Relation::UsesPackage)),
            );
        }

        self.graph.upsert_edges_batch(&edges).await
    }

    /// Seed, then add every record under batch mode, flushing every
    /// batch window.
    pub async fn build_from_records(&self, records: &[Record]) -> Result<BuildStats, KnowledgeError> {
        let seed = self.seed().await?;
        let mut stats = BuildStats {
            seed_nodes: seed.nodes,
            seed_edges: seed.edges,
            feature_nodes: records.len(),
            feature_edges: 0,
        };

        self.graph.begin_batch().await;
        let built = self.add_all(records, &mut stats).await;
        let ended = self.graph.end_batch().await;
        built?;
        ended?;

        tracing::info!(
            seed_nodes = stats.seed_nodes,
            seed_edges = stats.seed_edges,
            feature_nodes = stats.feature_nodes,
            feature_edges = stats.feature_edges,
            "graph build complete"
        );
        Ok(stats)
    }

    async fn add_all(&self, records: &[Record], stats: &mut BuildStats) -> Result<(), KnowledgeError> {
        for (i, record) in records.iter().enumerate() {
            match self.add_record(record).await {
                Ok(created) => stats.feature_edges += created,
                Err(e) => {
                    tracing::warn!(record_id = %record.id, error = %e, "skipping record in graph build")
                }
            }

            if (i + 1) % self.batch_window == 0 {
                self.graph.flush().await?;
                tracing::info!("graph: added {}/{} records", i + 1, records.len());
            }
        }
        Ok(())
    }
}
