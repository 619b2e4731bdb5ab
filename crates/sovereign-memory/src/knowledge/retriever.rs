//! Hybrid retrieval: similarity search expanded through the graph.
//!
//! A call embeds the query, takes the nearest records, expands their feature
//! nodes through the graph, and merges both sources into one ranked list.
//! Vector results always rank ahead of graph results.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;

use super::builder::feature_node_id;
use super::embedder::{truncate_chars, Embedder, NO_CODE_PLACEHOLDER};
use super::graph::GraphStore;
use super::models::Record;
use super::ontology::{Edge, Node, NodeType};
use super::records::RecordStore;
use crate::config::DEFAULT_CODE_PREVIEW_CHARS;

/// Score given to every graph result; ranks below any vector distance.
pub const GRAPH_RESULT_SCORE: f32 = 999.0;

/// Edge annotations shown per result.
const MAX_EDGES_SHOWN: usize = 3;
/// Language version names listed in the trailer.
const MAX_VERSIONS_SHOWN: usize = 5;

const CONTEXT_HEADER: &str = "## Retrieved Context\n";
const TRUNCATION_MARKER: &str = "\n// ... (truncated)";

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Vector,
    Graph,
}

/// One ranked record with the edges that touch its feature node.
#[derive(Debug, Clone)]
pub struct RagResult {
    pub record: Record,
    /// Distance for vector results, [`GRAPH_RESULT_SCORE`] for graph results.
    pub score: f32,
    pub origin: Origin,
    pub related_edges: Vec<Edge>,
}

/// Output of one retrieval call.
#[derive(Debug, Clone, Default)]
pub struct RagContext {
    pub results: Vec<RagResult>,
    /// Nodes discovered by graph expansion.
    pub nodes: Vec<Node>,
    /// Edges traversed by graph expansion.
    pub edges: Vec<Edge>,
}

impl RagContext {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn vector_results(&self) -> impl Iterator<Item = &RagResult> {
        self.results.iter().filter(|r| r.origin == Origin::Vector)
    }

    pub fn graph_results(&self) -> impl Iterator<Item = &RagResult> {
        self.results.iter().filter(|r| r.origin == Origin::Graph)
    }

    /// Render the context for prompt injection, within `max_chars`.
    pub fn format(&self, max_chars: usize) -> String {
        self.format_with(max_chars, DEFAULT_CODE_PREVIEW_CHARS)
    }

    /// Render with an explicit code preview length.
    ///
    /// The header counts toward the budget; if it alone does not fit the
    /// output is empty. Result blocks are appended whole, in rank order, and
    /// rendering stops at the first block that would cross `max_chars`. The
    /// version trailer is appended after the budgeted blocks. Lengths are in
    /// characters.
    pub fn format_with(&self, max_chars: usize, code_preview_chars: usize) -> String {
        let mut used = CONTEXT_HEADER.chars().count();
        if self.results.is_empty() || used > max_chars {
            return String::new();
        }

        let mut out = String::from(CONTEXT_HEADER);

        for (i, result) in self.results.iter().enumerate() {
            let block = format_result(i + 1, result, code_preview_chars);
            let len = block.chars().count();
            if used + len > max_chars {
                break;
            }
            out.push_str(&block);
            used += len;
        }

        let versions: Vec<&str> = self
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::LanguageVersion)
            .take(MAX_VERSIONS_SHOWN)
            .map(|n| n.name.as_str())
            .collect();
        if !versions.is_empty() {
            let _ = writeln!(out, "Related versions: {}", versions.join(", "));
        }

        out
    }
}

fn format_result(position: usize, result: &RagResult, code_preview_chars: usize) -> String {
    let record = &result.record;
    let mut block = String::new();

    let _ = writeln!(
        block,
        "### [{}] {} (C# {}, {})",
        position, record.feature_name, record.language_version, record.runtime_version
    );
    let _ = writeln!(block, "Category: {}", record.category);
    if !record.description.is_empty() {
        let _ = writeln!(block, "{}", record.description);
    }

    let code = record.code_snippet.trim();
    if !code.is_empty() && code != NO_CODE_PLACEHOLDER {
        let preview = truncate_chars(code, code_preview_chars);
        let marker = if preview.len() < code.len() {
            TRUNCATION_MARKER
        } else {
            ""
        };
        let _ = writeln!(block, "```csharp\n{preview}{marker}\n```");
    }

    let legacy = record.legacy_equivalent.trim();
    if !legacy.is_empty() && legacy != "N/A" {
        let _ = writeln!(block, "Previously: {legacy}");
    }

    if !result.related_edges.is_empty() {
        block.push_str("Relationships:\n");
        for edge in result.related_edges.iter().take(MAX_EDGES_SHOWN) {
            let _ = writeln!(block, "  - {}: {}", edge.relation, edge.target);
        }
    }

    block.push('\n');
    block
}

/// Combines similarity search over the record store with graph expansion.
pub struct HybridRetriever {
    records: Arc<RecordStore>,
    graph: Arc<GraphStore>,
    embedder: Arc<Embedder>,
}

impl HybridRetriever {
    pub fn new(records: Arc<RecordStore>, graph: Arc<GraphStore>, embedder: Arc<Embedder>) -> Self {
        Self {
            records,
            graph,
            embedder,
        }
    }

    /// Retrieve context for `query`.
    ///
    /// Never fails: an embedding or search failure yields an empty context,
    /// a graph failure yields the vector results alone.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        max_hops: usize,
        max_neighbors_per_hop: usize,
    ) -> RagContext {
        let vector = match self.embedder.embed_text(query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "query embedding failed, returning empty context");
                return RagContext::default();
            }
        };

        let hits = match self.records.search_similar(&vector, top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "similarity search failed, returning empty context");
                return RagContext::default();
            }
        };
        if hits.is_empty() {
            return RagContext::default();
        }

        let seeds: Vec<String> = hits.iter().map(|(r, _)| feature_node_id(&r.id)).collect();
        let traversal = match self.graph.expand(&seeds, max_hops, max_neighbors_per_hop).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "graph expansion failed, using vector results only");
                Default::default()
            }
        };

        let mut seen: HashSet<String> = HashSet::new();
        let mut results: Vec<RagResult> = Vec::with_capacity(hits.len());

        for (record, distance) in hits {
            let node_id = feature_node_id(&record.id);
            let related_edges = traversal.edges_touching(&node_id);
            seen.insert(node_id);
            results.push(RagResult {
                record,
                score: distance,
                origin: Origin::Vector,
                related_edges,
            });
        }

        for node in &traversal.nodes {
            if node.node_type != NodeType::Feature || seen.contains(&node.id) {
                continue;
            }
            seen.insert(node.id.clone());

            let Some(record_id) = node.id.strip_prefix("feature:") else {
                continue;
            };
            match self.records.get(record_id).await {
                Ok(Some(record)) => results.push(RagResult {
                    record,
                    score: GRAPH_RESULT_SCORE,
                    origin: Origin::Graph,
                    related_edges: traversal.edges_touching(&node.id),
                }),
                Ok(None) => {
                    tracing::debug!(node_id = %node.id, "feature node without record");
                }
                Err(e) => {
                    tracing::warn!(node_id = %node.id, error = %e, "failed to resolve graph result");
                }
            }
        }

        // Stable: graph results keep discovery order
        results.sort_by(|a, b| {
            origin_rank(a.origin)
                .cmp(&origin_rank(b.origin))
                .then(a.score.total_cmp(&b.score))
        });

        tracing::debug!(
            vector = results.iter().filter(|r| r.origin == Origin::Vector).count(),
            graph = results.iter().filter(|r| r.origin == Origin::Graph).count(),
            nodes = traversal.nodes.len(),
            "retrieval complete"
        );

        RagContext {
            results,
            nodes: traversal.nodes,
            edges: traversal.edges,
        }
    }
}

fn origin_rank(origin: Origin) -> u8 {
    match origin {
        Origin::Vector => 0,
        Origin::Graph => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::models::{Category, LanguageVersion, RuntimeVersion};
    use crate::knowledge::ontology::Relation;

    fn record(name: &str) -> Record {
        Record::new(
            Category::Language,
            LanguageVersion::V9_0,
            RuntimeVersion::Net5_0,
            name,
        )
        .with_description("A feature")
    }

    fn result(name: &str, origin: Origin) -> RagResult {
        RagResult {
            record: record(name),
            score: 0.1,
            origin,
            related_edges: Vec::new(),
        }
    }

    #[test]
    fn test_format_empty_context() {
        assert_eq!(RagContext::default().format(3000), "");
    }

    #[test]
    fn test_format_block_layout() {
        let mut r = result("Records", Origin::Vector);
        r.record.code_snippet = "public record P(int X);".to_string();
        r.record.legacy_equivalent = "Classes with Equals".to_string();
        r.related_edges = vec![Edge::new("feature:1", "csharp:9.0", Relation::IntroducedIn)];

        let context = RagContext {
            results: vec![r],
            nodes: vec![Node::new("csharp:9.0", NodeType::LanguageVersion, "C# 9.0")],
            edges: Vec::new(),
        };

        let text = context.format(3000);
        assert!(text.starts_with("## Retrieved Context\n### [1] Records (C# 9.0, .NET 5.0)\n"));
        assert!(text.contains("Category: language\nA feature\n"));
        assert!(text.contains("```csharp\npublic record P(int X);\n```\n"));
        assert!(text.contains("Previously: Classes with Equals\n"));
        assert!(text.contains("Relationships:\n  - INTRODUCED_IN: csharp:9.0\n"));
        assert!(text.ends_with("Related versions: C# 9.0\n"));
    }

    #[test]
    fn test_format_truncates_code_and_skips_placeholders() {
        let mut long = result("Long", Origin::Vector);
        long.record.code_snippet = "x".repeat(20);
        long.record.legacy_equivalent = "N/A".to_string();
        let mut none = result("None", Origin::Graph);
        none.record.code_snippet = NO_CODE_PLACEHOLDER.to_string();

        let context = RagContext {
            results: vec![long, none],
            ..Default::default()
        };
        let text = context.format_with(3000, 5);

        assert!(text.contains("xxxxx\n// ... (truncated)\n```"));
        assert!(!text.contains("Previously"));
        assert_eq!(text.matches("```csharp").count(), 1);
        assert!(!text.contains("Related versions"));
    }

    #[test]
    fn test_format_respects_budget() {
        let context = RagContext {
            results: (0..10)
                .map(|i| result(&format!("Feature {i}"), Origin::Vector))
                .collect(),
            ..Default::default()
        };

        let full = context.format(usize::MAX);
        for budget in [0, 30, 100, 250, full.chars().count() - 1] {
            let text = context.format(budget);
            assert!(text.chars().count() <= budget);
            assert!(!text.contains("Feature 9") || budget >= full.chars().count());
        }
    }

    #[test]
    fn test_format_stops_at_first_block_over_budget() {
        let top = result("Top", Origin::Vector);
        let mut big = result("Big", Origin::Vector);
        big.record.description = "d".repeat(400);
        let small = result("Small", Origin::Graph);

        let context = RagContext {
            results: vec![top, big, small],
            ..Default::default()
        };
        let text = context.format(200);

        assert!(text.starts_with(CONTEXT_HEADER));
        assert!(text.contains("### [1] Top"));
        assert!(!text.contains("Big"));
        assert!(!text.contains("Small"));
        assert_eq!(text.matches("### [").count(), 1);
    }

    #[test]
    fn test_format_empty_when_header_exceeds_budget() {
        let context = RagContext {
            results: vec![result("Top", Origin::Vector)],
            ..Default::default()
        };

        assert_eq!(context.format(0), "");
        assert_eq!(context.format(CONTEXT_HEADER.chars().count() - 1), "");
        assert_eq!(context.format(CONTEXT_HEADER.chars().count()), CONTEXT_HEADER);
    }

    #[test]
    fn test_origin_serialization() {
        assert_eq!(serde_json::to_value(Origin::Graph).unwrap(), "graph");
        assert!(origin_rank(Origin::Vector) < origin_rank(Origin::Graph));
    }
}
