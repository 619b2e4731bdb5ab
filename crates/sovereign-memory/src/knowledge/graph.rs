//! Graph store: typed nodes and typed, weighted, directed edges.
//!
//! Nodes are keyed by their canonical id, edges by the hash of their
//! (source, target, relation) triple. Edges are only ever inserted if
//! absent; the graph is append-only.
//!
//! # Batch mode
//!
//! [`GraphStore::begin_batch`] buffers writes in memory until
//! [`GraphStore::flush`], which commits them in a single transaction.
//! Readers see only committed data, so a batch must be flushed before the
//! graph is queried.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::db::{KnowledgeDb, EDGE_TABLE, NODE_TABLE};
use super::error::KnowledgeError;
use super::models::GraphStats;
use super::ontology::{Edge, Node, NodeType, Relation, TraversalResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeRow {
    /// Record key, set only for `INSERT`.
    #[serde(skip_serializing_if = "Option::is_none", skip_deserializing)]
    id: Option<String>,
    node_id: String,
    node_type: NodeType,
    name: String,
    /// JSON-encoded property bag.
    properties: String,
}

impl NodeRow {
    fn from_node(node: &Node, keyed: bool) -> Result<Self, KnowledgeError> {
        Ok(Self {
            id: keyed.then(|| node.id.clone()),
            node_id: node.id.clone(),
            node_type: node.node_type,
            name: node.name.clone(),
            properties: serde_json::to_string(&node.properties)?,
        })
    }

    fn into_node(self) -> Result<Node, KnowledgeError> {
        Ok(Node {
            id: self.node_id,
            node_type: self.node_type,
            name: self.name,
            properties: parse_properties(&self.properties)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EdgeRow {
    #[serde(skip_serializing_if = "Option::is_none", skip_deserializing)]
    id: Option<String>,
    edge_key: String,
    source: String,
    target: String,
    relation: Relation,
    weight: f32,
    properties: String,
    /// Insertion order.
    seq: i64,
}

impl EdgeRow {
    fn into_edge(self) -> Result<Edge, KnowledgeError> {
        Ok(Edge {
            source: self.source,
            target: self.target,
            relation: self.relation,
            weight: self.weight,
            properties: parse_properties(&self.properties)?,
        })
    }
}

fn parse_properties(raw: &str) -> Result<serde_json::Map<String, serde_json::Value>, KnowledgeError> {
    if raw.is_empty() {
        return Ok(serde_json::Map::new());
    }
    Ok(serde_json::from_str(raw)?)
}

enum PendingWrite {
    /// Insert or refresh a node.
    UpsertNode(NodeRow),
    /// Insert a node unless its id exists.
    InsertNode(NodeRow),
    /// Insert an edge unless its triple exists.
    InsertEdge(EdgeRow),
}

#[derive(Default)]
struct Pending {
    writes: Vec<PendingWrite>,
    node_ids: HashSet<String>,
    edge_keys: HashSet<String>,
}

impl Pending {
    fn push(&mut self, write: PendingWrite) {
        match &write {
            PendingWrite::UpsertNode(row) | PendingWrite::InsertNode(row) => {
                self.node_ids.insert(row.node_id.clone());
            }
            PendingWrite::InsertEdge(row) => {
                self.edge_keys.insert(row.edge_key.clone());
            }
        }
        self.writes.push(write);
    }
}

/// Persistent property graph with bounded traversal.
pub struct GraphStore {
    db: Arc<KnowledgeDb>,
    pending: Mutex<Option<Pending>>,
}

impl GraphStore {
    pub fn new(db: Arc<KnowledgeDb>) -> Self {
        Self {
            db,
            pending: Mutex::new(None),
        }
    }

    // ----- Batch mode -----

    /// Start buffering writes until the next flush. No-op if already batching.
    pub async fn begin_batch(&self) {
        let mut pending = self.pending.lock().await;
        if pending.is_none() {
            *pending = Some(Pending::default());
        }
    }

    pub async fn is_batching(&self) -> bool {
        self.pending.lock().await.is_some()
    }

    /// Commit buffered writes in one transaction and stay in batch mode.
    /// Returns the number of writes committed.
    pub async fn flush(&self) -> Result<usize, KnowledgeError> {
        let writes = {
            let mut pending = self.pending.lock().await;
            match pending.as_mut() {
                Some(p) => {
                    p.node_ids.clear();
                    p.edge_keys.clear();
                    std::mem::take(&mut p.writes)
                }
                None => return Ok(0),
            }
        };

        let count = writes.len();
        if let Err(e) = self.execute(writes).await {
            tracing::error!(error = %e, writes = count, "graph flush failed, buffered writes dropped");
            return Err(e);
        }
        tracing::debug!(writes = count, "graph batch flushed");
        Ok(count)
    }

    /// Flush and leave batch mode.
    pub async fn end_batch(&self) -> Result<usize, KnowledgeError> {
        let flushed = self.flush().await;
        *self.pending.lock().await = None;
        flushed
    }

    async fn submit(&self, writes: Vec<PendingWrite>) -> Result<(), KnowledgeError> {
        {
            let mut pending = self.pending.lock().await;
            if let Some(p) = pending.as_mut() {
                for write in writes {
                    p.push(write);
                }
                return Ok(());
            }
        }
        self.execute(writes).await.map(|_| ())
    }

    async fn execute(&self, writes: Vec<PendingWrite>) -> Result<usize, KnowledgeError> {
        if writes.is_empty() {
            return Ok(0);
        }

        let count = writes.len();
        let mut query = self.db.conn().query("BEGIN TRANSACTION");
        for (i, write) in writes.into_iter().enumerate() {
            query = match write {
                PendingWrite::UpsertNode(row) => query
                    .query(format!("UPSERT type::thing('{NODE_TABLE}', $k{i}) CONTENT $v{i}"))
                    .bind((format!("k{i}"), row.node_id.clone()))
                    .bind((format!("v{i}"), row)),
                PendingWrite::InsertNode(row) => query
                    .query(format!("INSERT IGNORE INTO {NODE_TABLE} $v{i}"))
                    .bind((format!("v{i}"), row)),
                PendingWrite::InsertEdge(row) => query
                    .query(format!("INSERT IGNORE INTO {EDGE_TABLE} $v{i}"))
                    .bind((format!("v{i}"), row)),
            };
        }

        query.query("COMMIT TRANSACTION").await?.check()?;
        Ok(count)
    }

    // ----- Node operations -----

    /// Insert a node or refresh the display name and properties of an
    /// existing one.
    pub async fn upsert_node(&self, node: &Node) -> Result<(), KnowledgeError> {
        if node.id.is_empty() {
            return Err(KnowledgeError::InvalidRecord("node with empty id".to_string()));
        }
        let row = NodeRow::from_node(node, false)?;
        self.submit(vec![PendingWrite::UpsertNode(row)]).await
    }

    /// Insert nodes whose ids are not yet present. Existing nodes are left
    /// untouched. Returns the number of nodes newly created.
    pub async fn upsert_nodes_batch(&self, nodes: &[Node]) -> Result<usize, KnowledgeError> {
        let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let mut known = self.existing_node_ids(ids).await?;

        let mut writes = Vec::new();
        for node in nodes {
            if node.id.is_empty() {
                tracing::warn!(name = %node.name, "skipping node with empty id");
                continue;
            }
            if !known.insert(node.id.clone()) {
                continue;
            }
            match NodeRow::from_node(node, true) {
                Ok(row) => writes.push(PendingWrite::InsertNode(row)),
                Err(e) => tracing::warn!(node_id = %node.id, error = %e, "failed to add node"),
            }
        }

        let created = writes.len();
        self.submit(writes).await?;
        Ok(created)
    }

    /// Ids among `ids` that are committed or waiting in the batch buffer.
    async fn existing_node_ids(&self, ids: Vec<String>) -> Result<HashSet<String>, KnowledgeError> {
        let mut found: HashSet<String> = {
            let pending = self.pending.lock().await;
            match pending.as_ref() {
                Some(p) => ids.iter().filter(|id| p.node_ids.contains(*id)).cloned().collect(),
                None => HashSet::new(),
            }
        };

        let committed: Vec<String> = self
            .db
            .conn()
            .query(format!("SELECT VALUE node_id FROM {NODE_TABLE} WHERE node_id INSIDE $ids"))
            .bind(("ids", ids))
            .await?
            .take(0)?;
        found.extend(committed);
        Ok(found)
    }

    pub async fn get_node(&self, id: &str) -> Result<Option<Node>, KnowledgeError> {
        let row: Option<NodeRow> = self
            .db
            .conn()
            .query("SELECT * OMIT id FROM type::thing($table, $id)")
            .bind(("table", NODE_TABLE))
            .bind(("id", id.to_string()))
            .await?
            .take(0)?;
        row.map(NodeRow::into_node).transpose()
    }

    /// Nodes whose name contains `needle` (case-insensitive), optionally of one type.
    pub async fn find_nodes(
        &self,
        needle: &str,
        node_type: Option<NodeType>,
    ) -> Result<Vec<Node>, KnowledgeError> {
        let type_clause = if node_type.is_some() {
            " AND node_type = $node_type"
        } else {
            ""
        };

        let mut query = self
            .db
            .conn()
            .query(format!(
                "SELECT * OMIT id FROM {NODE_TABLE} \
                 WHERE string::contains(string::lowercase(name), $needle){type_clause} \
                 ORDER BY node_id ASC"
            ))
            .bind(("needle", needle.to_lowercase()));
        if let Some(node_type) = node_type {
            query = query.bind(("node_type", node_type));
        }

        let rows: Vec<NodeRow> = query.await?.take(0)?;
        rows.into_iter().map(NodeRow::into_node).collect()
    }

    pub async fn nodes_by_type(&self, node_type: NodeType) -> Result<Vec<Node>, KnowledgeError> {
        let rows: Vec<NodeRow> = self
            .db
            .conn()
            .query(format!(
                "SELECT * OMIT id FROM {NODE_TABLE} WHERE node_type = $node_type ORDER BY node_id ASC"
            ))
            .bind(("node_type", node_type))
            .await?
            .take(0)?;
        rows.into_iter().map(NodeRow::into_node).collect()
    }

    async fn nodes_by_ids(&self, ids: Vec<String>) -> Result<HashMap<String, Node>, KnowledgeError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<NodeRow> = self
            .db
            .conn()
            .query(format!("SELECT * OMIT id FROM {NODE_TABLE} WHERE node_id INSIDE $ids"))
            .bind(("ids", ids))
            .await?
            .take(0)?;

        rows.into_iter()
            .map(|row| row.into_node().map(|node| (node.id.clone(), node)))
            .collect()
    }

    // ----- Edge operations -----

    /// Insert an edge unless its (source, target, relation) triple exists.
    /// Returns `true` if the edge was created.
    pub async fn upsert_edge(&self, edge: &Edge) -> Result<bool, KnowledgeError> {
        if let Some(reason) = invalid_edge(edge) {
            tracing::warn!(source = %edge.source, target = %edge.target, relation = %edge.relation, reason, "skipping edge");
            return Ok(false);
        }

        let key = edge.key();
        if self.edge_exists(&key).await? {
            return Ok(false);
        }

        let row = self.edge_row(edge, key)?;
        self.submit(vec![PendingWrite::InsertEdge(row)]).await?;
        Ok(true)
    }

    /// Insert many edges. Invalid and duplicate edges are skipped.
    /// Returns the number created.
    pub async fn upsert_edges_batch(&self, edges: &[Edge]) -> Result<usize, KnowledgeError> {
        let mut created = 0;
        for edge in edges {
            match self.upsert_edge(edge).await {
                Ok(true) => created += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(
                    source = %edge.source,
                    target = %edge.target,
                    relation = %edge.relation,
                    error = %e,
                    "failed to add edge"
                ),
            }
        }
        Ok(created)
    }

    fn edge_row(&self, edge: &Edge, key: String) -> Result<EdgeRow, KnowledgeError> {
        Ok(EdgeRow {
            id: Some(key.clone()),
            edge_key: key,
            source: edge.source.clone(),
            target: edge.target.clone(),
            relation: edge.relation,
            weight: edge.weight,
            properties: serde_json::to_string(&edge.properties)?,
            seq: self.db.next_seq(),
        })
    }

    async fn edge_exists(&self, key: &str) -> Result<bool, KnowledgeError> {
        {
            let pending = self.pending.lock().await;
            if pending.as_ref().is_some_and(|p| p.edge_keys.contains(key)) {
                return Ok(true);
            }
        }

        let found: Vec<String> = self
            .db
            .conn()
            .query("SELECT VALUE edge_key FROM type::thing($table, $key)")
            .bind(("table", EDGE_TABLE))
            .bind(("key", key.to_string()))
            .await?
            .take(0)?;
        Ok(!found.is_empty())
    }

    /// Edges leaving `id`, in insertion order.
    pub async fn outgoing(
        &self,
        id: &str,
        relation: Option<Relation>,
    ) -> Result<Vec<Edge>, KnowledgeError> {
        self.edges_at("source", id, relation).await
    }

    /// Edges arriving at `id`, in insertion order.
    pub async fn incoming(
        &self,
        id: &str,
        relation: Option<Relation>,
    ) -> Result<Vec<Edge>, KnowledgeError> {
        self.edges_at("target", id, relation).await
    }

    async fn edges_at(
        &self,
        endpoint: &str,
        id: &str,
        relation: Option<Relation>,
    ) -> Result<Vec<Edge>, KnowledgeError> {
        let relation_clause = if relation.is_some() {
            " AND relation = $relation"
        } else {
            ""
        };

        let mut query = self
            .db
            .conn()
            .query(format!(
                "SELECT * OMIT id FROM {EDGE_TABLE} WHERE {endpoint} = $id{relation_clause} ORDER BY seq ASC"
            ))
            .bind(("id", id.to_string()));
        if let Some(relation) = relation {
            query = query.bind(("relation", relation));
        }

        let rows: Vec<EdgeRow> = query.await?.take(0)?;
        rows.into_iter().map(EdgeRow::into_edge).collect()
    }

    // ----- Traversal -----

    /// Neighbouring nodes in both directions with their connecting edges.
    ///
    /// Outgoing edges come before incoming ones, each in insertion order;
    /// the merged list is stably sorted by weight (highest first) and cut
    /// to `limit`. Edges whose far node does not exist are dropped.
    pub async fn neighbors(&self, id: &str, limit: usize) -> Result<Vec<(Node, Edge)>, KnowledgeError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut edges: Vec<(String, Edge)> = self
            .outgoing(id, None)
            .await?
            .into_iter()
            .map(|e| (e.target.clone(), e))
            .collect();
        edges.extend(
            self.incoming(id, None)
                .await?
                .into_iter()
                .map(|e| (e.source.clone(), e)),
        );

        let ids: Vec<String> = edges
            .iter()
            .map(|(far, _)| far.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let nodes = self.nodes_by_ids(ids).await?;

        let mut result: Vec<(Node, Edge)> = edges
            .into_iter()
            .filter_map(|(far, edge)| nodes.get(&far).cloned().map(|node| (node, edge)))
            .collect();

        result.sort_by(|a, b| b.1.weight.total_cmp(&a.1.weight));
        result.truncate(limit);
        Ok(result)
    }

    /// Breadth-first expansion from `seeds`.
    ///
    /// Every seed starts out visited; resolvable seeds are part of the
    /// result. Each hop fetches at most
    /// `max_neighbors_per_hop` neighbours per frontier node; every traversed
    /// edge is recorded, and each node is added once, on first discovery.
    pub async fn expand(
        &self,
        seeds: &[String],
        max_hops: usize,
        max_neighbors_per_hop: usize,
    ) -> Result<TraversalResult, KnowledgeError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut result = TraversalResult::default();

        let mut frontier: Vec<String> = Vec::new();
        for id in seeds {
            if !visited.insert(id.clone()) {
                continue;
            }
            frontier.push(id.clone());
            if let Some(node) = self.get_node(id).await? {
                result.nodes.push(node);
            }
        }

        for hop in 0..max_hops {
            let mut next = Vec::new();

            for id in &frontier {
                for (node, edge) in self.neighbors(id, max_neighbors_per_hop).await? {
                    result.edges.push(edge);
                    if visited.insert(node.id.clone()) {
                        next.push(node.id.clone());
                        result.nodes.push(node);
                    }
                }
            }

            tracing::trace!(hop, discovered = next.len(), "graph expansion hop");
            frontier = next;
            if frontier.is_empty() {
                break;
            }
        }

        Ok(result)
    }

    // ----- Stats -----

    pub async fn stats(&self) -> Result<GraphStats, KnowledgeError> {
        Ok(GraphStats {
            total_nodes: self.db.count_table(NODE_TABLE).await?,
            total_edges: self.db.count_table(EDGE_TABLE).await?,
            node_type_counts: self.db.group_counts(NODE_TABLE, "node_type").await?,
            relation_type_counts: self.db.group_counts(EDGE_TABLE, "relation").await?,
        })
    }
}

fn invalid_edge(edge: &Edge) -> Option<&'static str> {
    if edge.source.is_empty() || edge.target.is_empty() {
        Some("empty endpoint")
    } else if !edge.weight.is_finite() {
        Some("non-finite weight")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_edge() {
        assert!(invalid_edge(&Edge::new("a", "b", Relation::RelatedTo)).is_none());
        assert!(invalid_edge(&Edge::new("", "b", Relation::RelatedTo)).is_some());
        assert!(invalid_edge(&Edge::new("a", "b", Relation::RelatedTo).with_weight(f32::NAN)).is_some());
    }

    #[test]
    fn test_node_row_keying() {
        let node = Node::new("csharp:9.0", NodeType::LanguageVersion, "C# 9.0");

        let keyed = serde_json::to_value(NodeRow::from_node(&node, true).unwrap()).unwrap();
        assert_eq!(keyed["id"], "csharp:9.0");

        let unkeyed = serde_json::to_value(NodeRow::from_node(&node, false).unwrap()).unwrap();
        assert!(unkeyed.get("id").is_none());
        assert_eq!(unkeyed["node_type"], "csharp_version");
    }

    #[test]
    fn test_properties_round_trip() {
        let node = Node::new("feature:1", NodeType::Feature, "Records")
            .with_property("category", "language");
        let row = NodeRow::from_node(&node, false).unwrap();
        assert_eq!(row.into_node().unwrap(), node);
        assert!(parse_properties("").unwrap().is_empty());
    }
}
