//! Data models for the knowledge store.

mod coverage;
mod record;
mod stats;
mod version;

pub use coverage::{compute_coverage, CoverageEntry, CoverageMatrix};
pub use record::{Record, MAX_FEATURE_NAME_CHARS};
pub use stats::{GraphStats, RecordStats, StoreStats};
pub use version::{Category, LanguageVersion, RuntimeVersion, ValidationStatus};
