//! Structured documentation record.

use serde::{Deserialize, Serialize};

use super::{Category, LanguageVersion, RuntimeVersion, ValidationStatus};
use crate::knowledge::error::KnowledgeError;

/// Maximum length of a feature name, in characters.
pub const MAX_FEATURE_NAME_CHARS: usize = 300;

/// A single feature/API record from the .NET ecosystem.
///
/// Everything except the validation fields is fixed at creation. The id is
/// assigned once by [`Record::new`] and shared by the record table, the
/// embedding table, and the graph (`feature:{id}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub category: Category,
    pub language_version: LanguageVersion,
    pub runtime_version: RuntimeVersion,
    pub feature_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub code_snippet: String,
    /// How this was done in earlier versions.
    #[serde(default)]
    pub legacy_equivalent: String,
    /// NuGet packages the snippet needs.
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub validation_status: ValidationStatus,
    /// Target framework used for validation, e.g. "net10.0".
    #[serde(default)]
    pub validation_target: String,
    #[serde(default)]
    pub validation_error: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Record {
    /// Create a record with a fresh id and empty content fields.
    pub fn new(
        category: Category,
        language_version: LanguageVersion,
        runtime_version: RuntimeVersion,
        feature_name: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            category,
            language_version,
            runtime_version,
            feature_name: feature_name.into(),
            description: String::new(),
            code_snippet: String::new(),
            legacy_equivalent: String::new(),
            packages: Vec::new(),
            source_url: String::new(),
            validation_status: ValidationStatus::Untested,
            validation_target: String::new(),
            validation_error: None,
            tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code_snippet = code.into();
        self
    }

    pub fn with_legacy(mut self, legacy: impl Into<String>) -> Self {
        self.legacy_equivalent = legacy.into();
        self
    }

    pub fn with_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages = packages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Check field constraints before the record is written.
    pub fn validate(&self) -> Result<(), KnowledgeError> {
        if self.id.trim().is_empty() {
            return Err(KnowledgeError::InvalidRecord("empty id".to_string()));
        }

        let name_len = self.feature_name.chars().count();
        if name_len == 0 || name_len > MAX_FEATURE_NAME_CHARS {
            return Err(KnowledgeError::InvalidRecord(format!(
                "feature_name must be 1..={} characters, got {} ({})",
                MAX_FEATURE_NAME_CHARS, name_len, self.id
            )));
        }

        Ok(())
    }
}
