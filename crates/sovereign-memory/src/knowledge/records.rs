//! Record store: structured records plus one fixed-dimension embedding each.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::db::{KnowledgeDb, EMBEDDING_TABLE, RECORD_TABLE};
use super::embedder::normalize;
use super::error::KnowledgeError;
use super::models::{
    Category, LanguageVersion, Record, RecordStats, RuntimeVersion, ValidationStatus,
};
use crate::config::DEFAULT_BATCH_WINDOW;

/// Filters for [`RecordStore::scan`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub category: Option<Category>,
    pub language_version: Option<LanguageVersion>,
    pub status: Option<ValidationStatus>,
    pub limit: Option<usize>,
}

impl RecordFilter {
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn language_version(mut self, version: LanguageVersion) -> Self {
        self.language_version = Some(version);
        self
    }

    pub fn status(mut self, status: ValidationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Row layout of `doc_record`. The record id lives in `record_id` because
/// `id` is the SurrealDB record key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordRow {
    record_id: String,
    category: Category,
    language_version: LanguageVersion,
    runtime_version: RuntimeVersion,
    feature_name: String,
    description: String,
    code_snippet: String,
    legacy_equivalent: String,
    packages: Vec<String>,
    source_url: String,
    validation_status: ValidationStatus,
    validation_target: String,
    validation_error: Option<String>,
    tags: Vec<String>,
    seq: i64,
}

impl RecordRow {
    fn from_record(record: &Record, seq: i64) -> Self {
        Self {
            record_id: record.id.clone(),
            category: record.category,
            language_version: record.language_version,
            runtime_version: record.runtime_version,
            feature_name: record.feature_name.clone(),
            description: record.description.clone(),
            code_snippet: record.code_snippet.clone(),
            legacy_equivalent: record.legacy_equivalent.clone(),
            packages: record.packages.clone(),
            source_url: record.source_url.clone(),
            validation_status: record.validation_status,
            validation_target: record.validation_target.clone(),
            validation_error: record.validation_error.clone(),
            tags: record.tags.clone(),
            seq,
        }
    }

    fn into_record(self) -> Record {
        Record {
            id: self.record_id,
            category: self.category,
            language_version: self.language_version,
            runtime_version: self.runtime_version,
            feature_name: self.feature_name,
            description: self.description,
            code_snippet: self.code_snippet,
            legacy_equivalent: self.legacy_equivalent,
            packages: self.packages,
            source_url: self.source_url,
            validation_status: self.validation_status,
            validation_target: self.validation_target,
            validation_error: self.validation_error,
            tags: self.tags,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRow {
    record_id: String,
    vector: Vec<f32>,
}

/// Persists records and their embeddings, keyed by record id.
pub struct RecordStore {
    db: Arc<KnowledgeDb>,
    batch_window: usize,
}

impl RecordStore {
    pub fn new(db: Arc<KnowledgeDb>) -> Self {
        Self {
            db,
            batch_window: DEFAULT_BATCH_WINDOW,
        }
    }

    /// Rows written per transaction in [`RecordStore::insert_batch`].
    pub fn with_batch_window(mut self, window: usize) -> Self {
        self.batch_window = window.max(1);
        self
    }

    /// Embedding dimension of the underlying store.
    pub fn dimension(&self) -> usize {
        self.db.dimension()
    }

    /// Insert or replace a record by id.
    pub async fn insert(&self, record: &Record) -> Result<(), KnowledgeError> {
        record.validate()?;
        let row = RecordRow::from_record(record, self.db.next_seq());

        self.db
            .conn()
            .query("UPSERT type::thing($table, $id) CONTENT $row")
            .bind(("table", RECORD_TABLE))
            .bind(("id", record.id.clone()))
            .bind(("row", row))
            .await?
            .check()?;
        Ok(())
    }

    /// Insert or replace many records, one transaction per window.
    ///
    /// Invalid records are logged and skipped. If a window fails to commit,
    /// its rows are retried one at a time so a single bad row cannot sink
    /// the rest. Returns the number of records written.
    pub async fn insert_batch(&self, records: &[Record]) -> Result<usize, KnowledgeError> {
        let mut written = 0;
        let mut seen = 0;

        for window in records.chunks(self.batch_window) {
            let rows: Vec<RecordRow> = window
                .iter()
                .filter_map(|record| match record.validate() {
                    Ok(()) => Some(RecordRow::from_record(record, self.db.next_seq())),
                    Err(e) => {
                        tracing::warn!(record_id = %record.id, error = %e, "skipping record");
                        None
                    }
                })
                .collect();

            written += self.write_window(rows).await;
            seen += window.len();

            if seen < records.len() {
                tracing::info!("inserted {}/{} records", seen, records.len());
            }
        }

        tracing::debug!(written, total = records.len(), "record batch complete");
        Ok(written)
    }

    async fn write_window(&self, rows: Vec<RecordRow>) -> usize {
        if rows.is_empty() {
            return 0;
        }

        let mut query = self.db.conn().query("BEGIN TRANSACTION");
        for (i, row) in rows.iter().enumerate() {
            query = query
                .query(format!(
                    "UPSERT type::thing('{RECORD_TABLE}', $id{i}) CONTENT $row{i}"
                ))
                .bind((format!("id{i}"), row.record_id.clone()))
                .bind((format!("row{i}"), row.clone()));
        }
        query = query.query("COMMIT TRANSACTION");

        let committed = match query.await {
            Ok(response) => response.check().map(|_| ()),
            Err(e) => Err(e),
        };

        match committed {
            Ok(()) => rows.len(),
            Err(e) => {
                tracing::warn!(error = %e, rows = rows.len(), "window commit failed, retrying rows individually");
                let mut written = 0;
                for row in rows {
                    let id = row.record_id.clone();
                    let result = self
                        .db
                        .conn()
                        .query("UPSERT type::thing($table, $id) CONTENT $row")
                        .bind(("table", RECORD_TABLE))
                        .bind(("id", id.clone()))
                        .bind(("row", row))
                        .await
                        .and_then(|r| r.check());
                    match result {
                        Ok(_) => written += 1,
                        Err(e) => tracing::warn!(record_id = %id, error = %e, "failed to insert record"),
                    }
                }
                written
            }
        }
    }

    /// Fetch a record by id.
    pub async fn get(&self, id: &str) -> Result<Option<Record>, KnowledgeError> {
        let row: Option<RecordRow> = self
            .db
            .conn()
            .query("SELECT * OMIT id FROM type::thing($table, $id)")
            .bind(("table", RECORD_TABLE))
            .bind(("id", id.to_string()))
            .await?
            .take(0)?;
        Ok(row.map(RecordRow::into_record))
    }

    /// Records matching `filter`, most recently written first.
    pub async fn scan(&self, filter: &RecordFilter) -> Result<Vec<Record>, KnowledgeError> {
        let (clause, vars) = where_clause(filter.category, filter.language_version, filter.status);
        let mut sql = format!("SELECT * OMIT id FROM {RECORD_TABLE}{clause} ORDER BY seq DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut query = self.db.conn().query(sql);
        for var in vars {
            query = query.bind(var);
        }

        let rows: Vec<RecordRow> = query.await?.take(0)?;
        Ok(rows.into_iter().map(RecordRow::into_record).collect())
    }

    /// Number of records matching the optional category and status.
    pub async fn count(
        &self,
        category: Option<Category>,
        status: Option<ValidationStatus>,
    ) -> Result<usize, KnowledgeError> {
        #[derive(Deserialize)]
        struct CountResult {
            count: i64,
        }

        let (clause, vars) = where_clause(category, None, status);
        let mut query = self
            .db
            .conn()
            .query(format!("SELECT count() FROM {RECORD_TABLE}{clause} GROUP ALL"));
        for var in vars {
            query = query.bind(var);
        }

        let result: Option<CountResult> = query.await?.take(0)?;
        Ok(result.map(|r| r.count as usize).unwrap_or(0))
    }

    /// Update only the validation fields. Returns `false` if the id is unknown.
    pub async fn update_validation(
        &self,
        id: &str,
        status: ValidationStatus,
        target: &str,
        error: Option<&str>,
    ) -> Result<bool, KnowledgeError> {
        #[derive(Deserialize)]
        struct Updated {
            #[allow(dead_code)]
            record_id: String,
        }

        let updated: Vec<Updated> = self
            .db
            .conn()
            .query(
                "UPDATE type::thing($table, $id) SET validation_status = $status, \
                 validation_target = $target, validation_error = $error RETURN record_id",
            )
            .bind(("table", RECORD_TABLE))
            .bind(("id", id.to_string()))
            .bind(("status", status))
            .bind(("target", target.to_string()))
            .bind(("error", error.map(str::to_string)))
            .await?
            .take(0)?;

        Ok(!updated.is_empty())
    }

    /// Store (or overwrite) the embedding for a record.
    ///
    /// The vector must match the store dimension; it is L2-normalised
    /// before it is written.
    pub async fn store_embedding(&self, id: &str, vector: &[f32]) -> Result<(), KnowledgeError> {
        let expected = self.db.dimension();
        if vector.len() != expected {
            return Err(KnowledgeError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        if self.get(id).await?.is_none() {
            return Err(KnowledgeError::NotFound(format!("record {id}")));
        }

        let row = EmbeddingRow {
            record_id: id.to_string(),
            vector: normalize(vector),
        };

        self.db
            .conn()
            .query("UPSERT type::thing($table, $id) CONTENT $row")
            .bind(("table", EMBEDDING_TABLE))
            .bind(("id", id.to_string()))
            .bind(("row", row))
            .await?
            .check()?;
        Ok(())
    }

    /// Whether a record has an embedding.
    pub async fn has_embedding(&self, id: &str) -> Result<bool, KnowledgeError> {
        let ids: Vec<String> = self
            .db
            .conn()
            .query("SELECT VALUE record_id FROM type::thing($table, $id)")
            .bind(("table", EMBEDDING_TABLE))
            .bind(("id", id.to_string()))
            .await?
            .take(0)?;
        Ok(!ids.is_empty())
    }

    /// Ids of records without an embedding, oldest first.
    pub async fn ids_without_embedding(&self, limit: usize) -> Result<Vec<String>, KnowledgeError> {
        #[derive(Deserialize)]
        struct Pending {
            record_id: String,
            #[allow(dead_code)]
            seq: i64,
        }

        let rows: Vec<Pending> = self
            .db
            .conn()
            .query(format!("LET $done = (SELECT VALUE record_id FROM {EMBEDDING_TABLE})"))
            .query(format!(
                "SELECT record_id, seq FROM {RECORD_TABLE} WHERE record_id NOTINSIDE $done \
                 ORDER BY seq ASC LIMIT {limit}"
            ))
            .await?
            .take(1)?;

        Ok(rows.into_iter().map(|r| r.record_id).collect())
    }

    /// Nearest records to `query` by Euclidean distance, closest first.
    ///
    /// Only records with an embedding take part.
    pub async fn search_similar(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<(Record, f32)>, KnowledgeError> {
        let expected = self.db.dimension();
        if query.len() != expected {
            return Err(KnowledgeError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        #[derive(Deserialize)]
        struct Hit {
            record_id: String,
            distance: f64,
        }

        // K is formatted directly, as with the LIMIT elsewhere
        let hits: Vec<Hit> = self
            .db
            .conn()
            .query(format!(
                "SELECT record_id, vector::distance::euclidean(vector, $query) AS distance \
                 FROM {EMBEDDING_TABLE} ORDER BY distance ASC LIMIT {top_k}"
            ))
            .bind(("query", normalize(query)))
            .await?
            .take(0)?;

        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = hits.iter().map(|h| h.record_id.clone()).collect();
        let rows: Vec<RecordRow> = self
            .db
            .conn()
            .query(format!(
                "SELECT * OMIT id FROM {RECORD_TABLE} WHERE record_id INSIDE $ids"
            ))
            .bind(("ids", ids))
            .await?
            .take(0)?;

        let mut by_id: HashMap<String, Record> = rows
            .into_iter()
            .map(|row| (row.record_id.clone(), row.into_record()))
            .collect();

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                by_id
                    .remove(&hit.record_id)
                    .map(|record| (record, hit.distance as f32))
            })
            .collect())
    }

    /// Aggregate counters.
    pub async fn stats(&self) -> Result<RecordStats, KnowledgeError> {
        let by_status = self.db.group_counts(RECORD_TABLE, "validation_status").await?;
        let status_count = |s: ValidationStatus| by_status.get(s.as_str()).copied().unwrap_or(0);

        Ok(RecordStats {
            total: self.db.count_table(RECORD_TABLE).await?,
            validated: status_count(ValidationStatus::Compiles),
            failed: status_count(ValidationStatus::Fails),
            untested: status_count(ValidationStatus::Untested),
            embedded: self.db.count_table(EMBEDDING_TABLE).await?,
            by_category: self.db.group_counts(RECORD_TABLE, "category").await?,
            by_version: self.db.group_counts(RECORD_TABLE, "language_version").await?,
        })
    }
}

/// Bound variables for a filtered record query.
type Vars = Vec<(&'static str, String)>;

fn where_clause(
    category: Option<Category>,
    language_version: Option<LanguageVersion>,
    status: Option<ValidationStatus>,
) -> (String, Vars) {
    let mut conditions = Vec::new();
    let mut vars: Vars = Vec::new();

    if let Some(category) = category {
        conditions.push("category = $category");
        vars.push(("category", category.as_str().to_string()));
    }
    if let Some(version) = language_version {
        conditions.push("language_version = $language_version");
        vars.push(("language_version", version.as_str().to_string()));
    }
    if let Some(status) = status {
        conditions.push("validation_status = $status");
        vars.push(("status", status.as_str().to_string()));
    }

    if conditions.is_empty() {
        (String::new(), vars)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), vars)
    }
}
