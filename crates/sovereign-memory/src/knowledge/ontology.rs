//! Graph vocabulary: node types, relation types, nodes, and edges.
//!
//! Nodes are keyed by a canonical string id (`csharp:9.0`, `feature:{uuid}`)
//! so the same logical entity always lands on the same node. Edges carry no
//! identity of their own beyond the (source, target, relation) triple.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Node type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "feature")]
    Feature,
    #[serde(rename = "csharp_version")]
    LanguageVersion,
    #[serde(rename = "dotnet_version")]
    RuntimeVersion,
    #[serde(rename = "framework")]
    Framework,
    #[serde(rename = "namespace")]
    Namespace,
    #[serde(rename = "nuget_package")]
    Package,
    #[serde(rename = "concept")]
    Concept,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Feature => "feature",
            NodeType::LanguageVersion => "csharp_version",
            NodeType::RuntimeVersion => "dotnet_version",
            NodeType::Framework => "framework",
            NodeType::Namespace => "namespace",
            NodeType::Package => "nuget_package",
            NodeType::Concept => "concept",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge relation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relation {
    /// feature → csharp_version
    IntroducedIn,
    /// feature → dotnet_version
    RequiresRuntime,
    /// new feature → old feature
    Replaces,
    /// older → newer (version chain)
    EvolvedInto,
    /// framework → framework
    DependsOn,
    /// feature → framework
    PartOf,
    /// feature → nuget_package
    UsesPackage,
    /// feature → feature
    RelatedTo,
    /// namespace → feature
    NamespaceOf,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::IntroducedIn => "INTRODUCED_IN",
            Relation::RequiresRuntime => "REQUIRES_RUNTIME",
            Relation::Replaces => "REPLACES",
            Relation::EvolvedInto => "EVOLVED_INTO",
            Relation::DependsOn => "DEPENDS_ON",
            Relation::PartOf => "PART_OF",
            Relation::UsesPackage => "USES_PACKAGE",
            Relation::RelatedTo => "RELATED_TO",
            Relation::NamespaceOf => "NAMESPACE_OF",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Canonical id, e.g. `framework:blazor`.
    pub id: String,
    pub node_type: NodeType,
    /// Display name.
    pub name: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: NodeType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            name: name.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Default edge weight.
pub const DEFAULT_EDGE_WEIGHT: f32 = 1.0;

/// A typed, weighted, directed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub relation: Relation,
    pub weight: f32,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, relation: Relation) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation,
            weight: DEFAULT_EDGE_WEIGHT,
            properties: Map::new(),
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Storage key derived from the (source, target, relation) triple.
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.target.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.relation.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Whether `node_id` is either endpoint.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Nodes and edges discovered by a bounded expansion.
#[derive(Debug, Clone, Default)]
pub struct TraversalResult {
    /// Distinct nodes in discovery order.
    pub nodes: Vec<Node>,
    /// Traversed edges; may repeat across hops.
    pub edges: Vec<Edge>,
}

impl TraversalResult {
    pub fn contains_node(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == node_id)
    }

    /// Edges touching `node_id`, in traversal order.
    pub fn edges_touching(&self, node_id: &str) -> Vec<Edge> {
        self.edges
            .iter()
            .filter(|e| e.touches(node_id))
            .cloned()
            .collect()
    }
}
