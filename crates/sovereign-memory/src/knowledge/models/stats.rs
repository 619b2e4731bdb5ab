//! Aggregate counters for the record and graph stores.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Record store statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordStats {
    /// Number of stored records.
    pub total: usize,
    /// Records whose snippet compiles.
    pub validated: usize,
    /// Records whose snippet fails to compile.
    pub failed: usize,
    /// Records not yet seen by the validator.
    pub untested: usize,
    /// Records with an associated embedding.
    pub embedded: usize,
    /// Record count per category key.
    pub by_category: BTreeMap<String, usize>,
    /// Record count per language version.
    pub by_version: BTreeMap<String, usize>,
}

/// Graph store statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    /// Node count per node type tag.
    pub node_type_counts: BTreeMap<String, usize>,
    /// Edge count per relation name.
    pub relation_type_counts: BTreeMap<String, usize>,
}

/// Combined statistics for the knowledge base.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub records: RecordStats,
    pub graph: GraphStats,
    /// When the stats were computed.
    pub collected_at: Option<chrono::DateTime<chrono::Utc>>,
}
