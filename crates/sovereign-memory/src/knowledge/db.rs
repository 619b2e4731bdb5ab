//! SurrealDB embedded database backing the record and graph stores.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use surrealdb::engine::local::{Db, RocksDb};
use surrealdb::Surreal;

use super::error::KnowledgeError;

/// Table holding structured records.
pub(crate) const RECORD_TABLE: &str = "doc_record";
/// Table holding one embedding per record.
pub(crate) const EMBEDDING_TABLE: &str = "doc_embedding";
pub(crate) const NODE_TABLE: &str = "graph_node";
pub(crate) const EDGE_TABLE: &str = "graph_edge";

/// Database connection shared by the stores.
///
/// The embedding dimension is written on first open and checked on every
/// later open; a store cannot change dimension once created.
pub struct KnowledgeDb {
    db: Surreal<Db>,
    dimension: usize,
    last_seq: AtomicI64,
}

impl KnowledgeDb {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path, dimension: usize) -> Result<Self, KnowledgeError> {
        if dimension == 0 {
            return Err(KnowledgeError::Config(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }

        let db = Surreal::new::<RocksDb>(path).await?;
        db.use_ns("sovereign").use_db("memory").await?;

        let kdb = Self {
            db,
            dimension,
            last_seq: AtomicI64::new(0),
        };
        kdb.initialize_schema().await?;
        kdb.ensure_dimension().await?;

        tracing::debug!(path = %path.display(), dimension, "knowledge db opened");
        Ok(kdb)
    }

    /// Embedding dimension fixed for this store.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub(crate) fn conn(&self) -> &Surreal<Db> {
        &self.db
    }

    /// Monotonic write stamp used for recency and insertion ordering.
    pub(crate) fn next_seq(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let mut last = self.last_seq.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self
                .last_seq
                .compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    async fn initialize_schema(&self) -> Result<(), KnowledgeError> {
        // Records
        self.db
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS doc_record SCHEMAFULL;
                DEFINE FIELD IF NOT EXISTS record_id ON doc_record TYPE string;
                DEFINE FIELD IF NOT EXISTS category ON doc_record TYPE string;
                DEFINE FIELD IF NOT EXISTS language_version ON doc_record TYPE string;
                DEFINE FIELD IF NOT EXISTS runtime_version ON doc_record TYPE string;
                DEFINE FIELD IF NOT EXISTS feature_name ON doc_record TYPE string;
                DEFINE FIELD IF NOT EXISTS description ON doc_record TYPE string;
                DEFINE FIELD IF NOT EXISTS code_snippet ON doc_record TYPE string;
                DEFINE FIELD IF NOT EXISTS legacy_equivalent ON doc_record TYPE string;
                DEFINE FIELD IF NOT EXISTS packages ON doc_record TYPE array<string>;
                DEFINE FIELD IF NOT EXISTS source_url ON doc_record TYPE string;
                DEFINE FIELD IF NOT EXISTS validation_status ON doc_record TYPE string;
                DEFINE FIELD IF NOT EXISTS validation_target ON doc_record TYPE string;
                DEFINE FIELD IF NOT EXISTS validation_error ON doc_record TYPE option<string>;
                DEFINE FIELD IF NOT EXISTS tags ON doc_record TYPE array<string>;
                DEFINE FIELD IF NOT EXISTS seq ON doc_record TYPE int;
                DEFINE INDEX IF NOT EXISTS doc_record_id ON doc_record FIELDS record_id UNIQUE;
                DEFINE INDEX IF NOT EXISTS doc_record_category ON doc_record FIELDS category;
                DEFINE INDEX IF NOT EXISTS doc_record_status ON doc_record FIELDS validation_status;
                DEFINE INDEX IF NOT EXISTS doc_record_seq ON doc_record FIELDS seq;
                "#,
            )
            .await?
            .check()?;

        // Embeddings, one row per record id
        self.db
            .query(format!(
                r#"
                DEFINE TABLE IF NOT EXISTS doc_embedding SCHEMAFULL;
                DEFINE FIELD IF NOT EXISTS record_id ON doc_embedding TYPE string;
                DEFINE FIELD IF NOT EXISTS vector ON doc_embedding TYPE array<float>
                    ASSERT array::len($value) = {};
                DEFINE INDEX IF NOT EXISTS doc_embedding_id ON doc_embedding FIELDS record_id UNIQUE;
                "#,
                self.dimension
            ))
            .await?
            .check()?;

        // Graph nodes and edges. Edge record ids are the triple hash, so a
        // second insert of the same triple is ignored by the storage layer.
        self.db
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS graph_node SCHEMALESS;
                DEFINE FIELD IF NOT EXISTS node_id ON graph_node TYPE string;
                DEFINE FIELD IF NOT EXISTS node_type ON graph_node TYPE string;
                DEFINE FIELD IF NOT EXISTS name ON graph_node TYPE string;
                DEFINE INDEX IF NOT EXISTS graph_node_id ON graph_node FIELDS node_id UNIQUE;
                DEFINE INDEX IF NOT EXISTS graph_node_type ON graph_node FIELDS node_type;

                DEFINE TABLE IF NOT EXISTS graph_edge SCHEMALESS;
                DEFINE FIELD IF NOT EXISTS edge_key ON graph_edge TYPE string;
                DEFINE FIELD IF NOT EXISTS source ON graph_edge TYPE string;
                DEFINE FIELD IF NOT EXISTS target ON graph_edge TYPE string;
                DEFINE FIELD IF NOT EXISTS relation ON graph_edge TYPE string;
                DEFINE FIELD IF NOT EXISTS weight ON graph_edge TYPE float;
                DEFINE FIELD IF NOT EXISTS seq ON graph_edge TYPE int;
                DEFINE INDEX IF NOT EXISTS graph_edge_key ON graph_edge FIELDS edge_key UNIQUE;
                DEFINE INDEX IF NOT EXISTS graph_edge_source ON graph_edge FIELDS source, relation;
                DEFINE INDEX IF NOT EXISTS graph_edge_target ON graph_edge FIELDS target, relation;
                DEFINE INDEX IF NOT EXISTS graph_edge_relation ON graph_edge FIELDS relation;
                "#,
            )
            .await?
            .check()?;

        self.db
            .query("DEFINE TABLE IF NOT EXISTS store_meta SCHEMALESS;")
            .await?
            .check()?;

        Ok(())
    }

    async fn ensure_dimension(&self) -> Result<(), KnowledgeError> {
        #[derive(Deserialize)]
        struct MetaRow {
            value: i64,
        }

        let existing: Option<MetaRow> = self
            .db
            .query("SELECT value FROM type::thing('store_meta', 'embedding_dim')")
            .await?
            .take(0)?;

        match existing {
            Some(row) if row.value != self.dimension as i64 => Err(KnowledgeError::Config(format!(
                "store was created with embedding dimension {}, configured {}",
                row.value, self.dimension
            ))),
            Some(_) => Ok(()),
            None => {
                self.db
                    .query("CREATE type::thing('store_meta', 'embedding_dim') SET value = $value")
                    .bind(("value", self.dimension as i64))
                    .await?
                    .check()?;
                Ok(())
            }
        }
    }

    /// Count all rows of a table.
    pub(crate) async fn count_table(&self, table: &str) -> Result<usize, KnowledgeError> {
        // SurrealDB returns count as { count: N }
        #[derive(Deserialize)]
        struct CountResult {
            count: i64,
        }

        let result: Option<CountResult> = self
            .db
            .query(format!("SELECT count() FROM {} GROUP ALL", table))
            .await?
            .take(0)?;
        Ok(result.map(|r| r.count as usize).unwrap_or(0))
    }

    /// Row counts grouped by a string field.
    pub(crate) async fn group_counts(
        &self,
        table: &str,
        field: &str,
    ) -> Result<BTreeMap<String, usize>, KnowledgeError> {
        let rows: Vec<serde_json::Value> = self
            .db
            .query(format!(
                "SELECT {field}, count() AS count FROM {table} GROUP BY {field}"
            ))
            .await?
            .take(0)?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let key = row.get(field).and_then(|v| v.as_str());
            let count = row.get("count").and_then(|v| v.as_u64());
            if let (Some(key), Some(count)) = (key, count) {
                counts.insert(key.to_string(), count as usize);
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_seq_is_strictly_increasing() {
        let dir = TempDir::new().unwrap();
        let db = KnowledgeDb::open(&dir.path().join("db"), 4).await.unwrap();

        let a = db.next_seq();
        let b = db.next_seq();
        let c = db.next_seq();
        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn test_dimension_is_fixed_at_creation() {
        let dir = TempDir::new().unwrap();
        let db = KnowledgeDb::open(&dir.path().join("db"), 8).await.unwrap();
        assert_eq!(db.dimension(), 8);

        // Matching persisted dimension passes
        db.ensure_dimension().await.unwrap();

        db.conn()
            .query("UPDATE type::thing('store_meta', 'embedding_dim') SET value = 16")
            .await
            .unwrap();
        let err = db.ensure_dimension().await.err().unwrap();
        assert!(matches!(err, KnowledgeError::Config(_)));
    }

    #[tokio::test]
    async fn test_zero_dimension_rejected() {
        let dir = TempDir::new().unwrap();
        let err = KnowledgeDb::open(&dir.path().join("db"), 0).await.err().unwrap();
        assert!(matches!(err, KnowledgeError::Config(_)));
    }
}
