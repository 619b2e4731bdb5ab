//! Scraping and validation progress per version and category.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Category, LanguageVersion, Record, ValidationStatus};

/// Coverage counters for one language version or category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageEntry {
    /// Version string or category key.
    pub key: String,
    pub total_features: usize,
    pub features_validated: usize,
    pub features_failed: usize,
}

impl CoverageEntry {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            total_features: 0,
            features_validated: 0,
            features_failed: 0,
        }
    }

    fn count(&mut self, status: ValidationStatus) {
        self.total_features += 1;
        match status {
            ValidationStatus::Compiles => self.features_validated += 1,
            ValidationStatus::Fails => self.features_failed += 1,
            ValidationStatus::Untested => {}
        }
    }

    /// Share of features that compile, as a percentage.
    pub fn completion_pct(&self) -> f64 {
        if self.total_features == 0 {
            return 0.0;
        }
        self.features_validated as f64 / self.total_features as f64 * 100.0
    }
}

/// Progress tracking across all versions and categories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageMatrix {
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
    /// Non-empty entries, oldest language version first.
    pub by_version: Vec<CoverageEntry>,
    /// Non-empty entries in category order.
    pub by_category: Vec<CoverageEntry>,
    pub total_records: usize,
    pub total_validated: usize,
}

/// Compute coverage stats from a set of records.
pub fn compute_coverage(records: &[Record]) -> CoverageMatrix {
    let mut by_version: BTreeMap<LanguageVersion, CoverageEntry> = LanguageVersion::ALL
        .iter()
        .map(|v| (*v, CoverageEntry::new(v.as_str())))
        .collect();
    let mut by_category: BTreeMap<Category, CoverageEntry> = Category::ALL
        .iter()
        .map(|c| (*c, CoverageEntry::new(c.as_str())))
        .collect();

    for record in records {
        if let Some(entry) = by_version.get_mut(&record.language_version) {
            entry.count(record.validation_status);
        }
        if let Some(entry) = by_category.get_mut(&record.category) {
            entry.count(record.validation_status);
        }
    }

    let total_validated = records
        .iter()
        .filter(|r| r.validation_status == ValidationStatus::Compiles)
        .count();

    CoverageMatrix {
        last_updated: Some(chrono::Utc::now()),
        by_version: by_version
            .into_values()
            .filter(|e| e.total_features > 0)
            .collect(),
        by_category: by_category
            .into_values()
            .filter(|e| e.total_features > 0)
            .collect(),
        total_records: records.len(),
        total_validated,
    }
}
