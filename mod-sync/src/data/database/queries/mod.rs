//! Query operations, one struct of associated functions per table group
//!
//! Every function is generic over `ConnectionTrait` so it runs equally on a pooled
//! connection or inside a transaction.

mod cache;
mod project;
mod translation;
mod workshop;

pub use cache::{AnalysisCacheQueries, ScanCacheQueries};
pub use project::{GameInstallationQueries, ProjectQueries};
pub use translation::{NewUnitRow, TranslationQueries};
pub use workshop::WorkshopModQueries;

/// Keys per `IN (...)` clause; stays well below SQLite's bound variable limit
pub(crate) const IN_CLAUSE_CHUNK: usize = 500;

/// Rows per multi-row INSERT
pub(crate) const INSERT_BATCH: usize = 100;

/// Current Unix timestamp (seconds)
pub(crate) fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}
