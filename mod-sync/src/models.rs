use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::core::cache::CacheValidity;

// ============================================================================
// Inventory
// ============================================================================

/// One Workshop mod folder with its pack file, produced fresh by every scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModArchiveRecord {
    pub workshop_id: String,
    pub directory_path: PathBuf,
    pub archive_path: PathBuf,
    /// File name of the pack without extension
    pub archive_base_name: String,
    /// Pack mtime truncated to whole seconds
    pub last_modified: i64,
    pub image_path: Option<PathBuf>,
}

impl ModArchiveRecord {
    /// Cache key for this archive
    pub fn archive_key(&self) -> String {
        crate::core::path_utils::path_key(&self.archive_path)
    }
}

// ============================================================================
// Caches
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCacheEntry {
    pub id: String,
    pub archive_path: String,
    pub last_modified: i64,
    pub has_loc_content: bool,
    pub scanned_at: i64,
}

impl CacheValidity for ScanCacheEntry {
    fn is_valid_for(&self, current_last_modified: i64) -> bool {
        self.last_modified == current_last_modified
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCacheKey {
    pub project_id: String,
    pub archive_path: String,
}

impl AnalysisCacheKey {
    pub fn new(project_id: impl Into<String>, archive_path: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            archive_path: archive_path.into(),
        }
    }
}

/// Stores diff counts only; a non-zero entry means the full diff must be re-extracted
/// before anything can be applied or displayed in detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCacheEntry {
    pub id: String,
    pub project_id: String,
    pub archive_path: String,
    pub last_modified: i64,
    pub new_count: i64,
    pub removed_count: i64,
    pub modified_count: i64,
    pub reactivated_count: i64,
    pub total_pack_units: i64,
    pub total_project_units: i64,
    pub analyzed_at: i64,
}

impl AnalysisCacheEntry {
    pub fn key(&self) -> AnalysisCacheKey {
        AnalysisCacheKey::new(self.project_id.clone(), self.archive_path.clone())
    }

    pub fn from_summary(
        key: &AnalysisCacheKey,
        last_modified: i64,
        summary: &PendingChangesSummary,
        analyzed_at: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: key.project_id.clone(),
            archive_path: key.archive_path.clone(),
            last_modified,
            new_count: summary.new_units as i64,
            removed_count: summary.removed_units as i64,
            modified_count: summary.modified_units as i64,
            reactivated_count: summary.reactivated_units as i64,
            total_pack_units: summary.total_pack_units as i64,
            total_project_units: summary.total_project_units as i64,
            analyzed_at,
        }
    }

    pub fn summary(&self) -> PendingChangesSummary {
        PendingChangesSummary {
            new_units: self.new_count.max(0) as usize,
            removed_units: self.removed_count.max(0) as usize,
            modified_units: self.modified_count.max(0) as usize,
            reactivated_units: self.reactivated_count.max(0) as usize,
            total_pack_units: self.total_pack_units.max(0) as usize,
            total_project_units: self.total_project_units.max(0) as usize,
        }
    }

    pub fn has_pending_changes(&self) -> bool {
        self.summary().has_changes()
    }
}

impl CacheValidity for AnalysisCacheEntry {
    fn is_valid_for(&self, current_last_modified: i64) -> bool {
        self.last_modified == current_last_modified
    }
}

// ============================================================================
// Remote metadata
// ============================================================================

/// Last known server-side state of a Workshop item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteModRecord {
    pub workshop_id: String,
    pub app_id: String,
    pub title: String,
    pub subscriptions: Option<i64>,
    pub time_updated: i64,
    pub preview_url: Option<String>,
    pub last_checked_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    /// Fetched in this pass
    Remote,
    /// Previously persisted record, fetch failed or omitted the mod
    Cached,
    /// Title derived from the pack file name, nothing known remotely
    Derived,
}

/// Per-mod merge result of fresh, cached and derived metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedModMetadata {
    pub workshop_id: String,
    pub title: String,
    pub subscriptions: Option<i64>,
    pub time_updated: Option<i64>,
    pub preview_url: Option<String>,
    pub source: MetadataSource,
    /// Remote timestamp persisted before this pass
    pub previous_time_updated: Option<i64>,
}

// ============================================================================
// Diff
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUnitData {
    pub key: String,
    pub source_text: String,
    pub source_loc_file: Option<String>,
}

/// Categorized key sets between a pack and a project's active units
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub new_unit_keys: HashSet<String>,
    pub new_units_data: Vec<NewUnitData>,
    pub removed_unit_keys: HashSet<String>,
    pub modified_unit_keys: HashSet<String>,
    pub modified_source_texts: HashMap<String, String>,
    pub reactivated_unit_keys: HashSet<String>,
    /// Pack texts of reactivated keys whose stored text differs
    pub reactivated_source_texts: HashMap<String, String>,
    pub total_pack_units: usize,
    pub total_project_units: usize,
}

impl DiffResult {
    pub fn total_changes(&self) -> usize {
        self.new_unit_keys.len()
            + self.removed_unit_keys.len()
            + self.modified_unit_keys.len()
            + self.reactivated_unit_keys.len()
    }

    pub fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }

    pub fn summary(&self) -> PendingChangesSummary {
        PendingChangesSummary {
            new_units: self.new_unit_keys.len(),
            removed_units: self.removed_unit_keys.len(),
            modified_units: self.modified_unit_keys.len(),
            reactivated_units: self.reactivated_unit_keys.len(),
            total_pack_units: self.total_pack_units,
            total_project_units: self.total_project_units,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChangesSummary {
    pub new_units: usize,
    pub removed_units: usize,
    pub modified_units: usize,
    pub reactivated_units: usize,
    pub total_pack_units: usize,
    pub total_project_units: usize,
}

impl PendingChangesSummary {
    pub fn total_changes(&self) -> usize {
        self.new_units + self.removed_units + self.modified_units + self.reactivated_units
    }

    pub fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }

    /// Same totals, all change counts cleared
    pub fn cleared(&self) -> Self {
        Self {
            total_pack_units: self.total_pack_units,
            total_project_units: self.total_project_units,
            ..Self::default()
        }
    }
}

// ============================================================================
// Translation store
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStatus {
    Pending,
    Translated,
    Reviewed,
    Approved,
    NeedsReview,
}

impl TranslationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationStatus::Pending => "pending",
            TranslationStatus::Translated => "translated",
            TranslationStatus::Reviewed => "reviewed",
            TranslationStatus::Approved => "approved",
            TranslationStatus::NeedsReview => "needs_review",
        }
    }

    /// Unknown strings are treated as pending
    pub fn parse(s: &str) -> Self {
        match s {
            "translated" => TranslationStatus::Translated,
            "reviewed" => TranslationStatus::Reviewed,
            "approved" => TranslationStatus::Approved,
            "needs_review" => TranslationStatus::NeedsReview,
            _ => TranslationStatus::Pending,
        }
    }
}

/// Counts of rows touched by one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub added: usize,
    pub modified: usize,
    pub obsoleted: usize,
    pub reactivated: usize,
}

impl ReconciliationReport {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.modified == 0 && self.obsoleted == 0 && self.reactivated == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInstallation {
    pub id: String,
    pub game_code: String,
    pub game_name: String,
    pub installation_path: Option<String>,
    pub workshop_path: Option<String>,
    pub steam_app_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub game_installation_id: String,
    pub source_file_path: Option<String>,
    pub mod_steam_id: Option<String>,
    /// Remote update timestamp this project was last fully reconciled against
    pub source_mod_updated: Option<i64>,
}

// ============================================================================
// Scan results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModUpdateStatus {
    NotImported,
    UpToDate,
    /// Remote is newer than the local pack; user has to re-download first
    NeedsDownload,
    HasChanges,
    /// Analysis failed this pass; retried on the next scan
    AnalysisFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedModSummary {
    pub workshop_id: String,
    pub title: String,
    pub image: Option<String>,
    pub archive_path: String,
    pub local_last_modified: i64,
    pub remote_time_updated: Option<i64>,
    pub subscriptions: Option<i64>,
    pub metadata_source: MetadataSource,
    pub project_id: Option<String>,
    pub status: ModUpdateStatus,
    pub pending_changes: Option<PendingChangesSummary>,
}

impl DetectedModSummary {
    pub fn is_imported(&self) -> bool {
        self.project_id.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanModsOutcome {
    pub mods: Vec<DetectedModSummary>,
    pub translation_stats_changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_cache_validity_is_mtime_equality() {
        let entry = ScanCacheEntry {
            id: "1".to_string(),
            archive_path: "/mods/5/x.pack".to_string(),
            last_modified: 100,
            has_loc_content: true,
            scanned_at: 50,
        };
        assert!(entry.is_valid_for(100));
        assert!(!entry.is_valid_for(101));
        assert!(!entry.is_valid_for(99));
    }

    #[test]
    fn test_analysis_entry_summary_round_trip() {
        let key = AnalysisCacheKey::new("p1", "/mods/5/x.pack");
        let summary = PendingChangesSummary {
            new_units: 2,
            removed_units: 1,
            modified_units: 0,
            reactivated_units: 3,
            total_pack_units: 10,
            total_project_units: 9,
        };
        let entry = AnalysisCacheEntry::from_summary(&key, 42, &summary, 7);
        assert_eq!(entry.key(), key);
        assert_eq!(entry.summary(), summary);
        assert!(entry.has_pending_changes());

        let cleared = AnalysisCacheEntry::from_summary(&key, 42, &summary.cleared(), 7);
        assert!(!cleared.has_pending_changes());
        assert_eq!(cleared.total_pack_units, 10);
    }

    #[test]
    fn test_translation_status_strings() {
        for status in [
            TranslationStatus::Pending,
            TranslationStatus::Translated,
            TranslationStatus::Reviewed,
            TranslationStatus::Approved,
            TranslationStatus::NeedsReview,
        ] {
            assert_eq!(TranslationStatus::parse(status.as_str()), status);
        }
        assert_eq!(TranslationStatus::parse("bogus"), TranslationStatus::Pending);
    }

    #[test]
    fn test_report_noop() {
        assert!(ReconciliationReport::default().is_noop());
        let report = ReconciliationReport {
            obsoleted: 1,
            ..Default::default()
        };
        assert!(!report.is_noop());
    }
}
