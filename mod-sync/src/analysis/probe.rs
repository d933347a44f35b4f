//! Localization content probe
//!
//! Decides for each pack whether it carries localization tables, using the scan
//! cache first and the archive inspector only for packs whose cached mtime no
//! longer matches.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::cache::{partition_by_validity, KeyedCache};
use crate::core::performance;
use crate::core::task_control::TaskControl;
use crate::error::ApiResult;
use crate::logger;
use crate::models::{ModArchiveRecord, ScanCacheEntry};
use crate::progress::{emit, ScanEventLevel, ScanEventSink};
use crate::tools::{is_localization_entry, ArchiveInspector};

const CONTEXT: &str = "probe";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Archive key -> contains localization tables. Archives that could not be
    /// probed are absent.
    pub has_localization: HashMap<String, bool>,
    pub cache_hits: usize,
    pub probed: usize,
    pub skipped: usize,
}

impl ProbeOutcome {
    /// Records whose pack is known to carry localization, in input order
    pub fn with_localization(&self, records: &[ModArchiveRecord]) -> Vec<ModArchiveRecord> {
        records
            .iter()
            .filter(|record| {
                self.has_localization
                    .get(&record.archive_key())
                    .copied()
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }
}

pub struct LocalizationContentProbe {
    inspector: Arc<dyn ArchiveInspector>,
    cache: Arc<dyn KeyedCache<String, ScanCacheEntry>>,
}

impl LocalizationContentProbe {
    pub fn new(
        inspector: Arc<dyn ArchiveInspector>,
        cache: Arc<dyn KeyedCache<String, ScanCacheEntry>>,
    ) -> Self {
        Self { inspector, cache }
    }

    /// Probe every record, flushing all new outcomes to the cache in one batch.
    ///
    /// Only cancellation is returned as an error; per-archive failures leave that
    /// archive out of the outcome.
    pub async fn probe_all(
        &self,
        game_code: &str,
        records: &[ModArchiveRecord],
        sink: &dyn ScanEventSink,
        task: &TaskControl,
    ) -> ApiResult<ProbeOutcome> {
        let mut outcome = ProbeOutcome::default();
        if records.is_empty() {
            return Ok(outcome);
        }

        let current: Vec<(String, i64)> = records
            .iter()
            .map(|record| (record.archive_key(), record.last_modified))
            .collect();
        let keys: Vec<String> = current.iter().map(|(key, _)| key.clone()).collect();

        let cached = match self.cache.get_many(&keys).await {
            Ok(cached) => cached,
            Err(e) => {
                logger::log_warn(
                    &format!("Scan cache unavailable, probing every pack: {}", e),
                    Some(CONTEXT),
                );
                HashMap::new()
            }
        };
        let (valid, stale) = partition_by_validity(&current, &cached);

        for (key, entry) in &valid {
            performance::record_cache_hit();
            outcome
                .has_localization
                .insert(key.clone(), entry.has_loc_content);
        }
        outcome.cache_hits = valid.len();

        if stale.is_empty() {
            return Ok(outcome);
        }

        if !self.inspector.is_available().await {
            emit(
                sink,
                ScanEventLevel::Warning,
                format!(
                    "Pack inspector unavailable, skipping {} unscanned mods",
                    stale.len()
                ),
                CONTEXT,
            );
            outcome.skipped = stale.len();
            return Ok(outcome);
        }

        let by_key: HashMap<String, &ModArchiveRecord> = records
            .iter()
            .map(|record| (record.archive_key(), record))
            .collect();
        let total = stale.len();
        let mut fresh: Vec<(String, ScanCacheEntry)> = Vec::with_capacity(total);
        let mut cancelled = None;

        for (index, key) in stale.iter().enumerate() {
            if let Err(e) = task.ensure_not_cancelled("Pack scan") {
                cancelled = Some(e);
                break;
            }
            let Some(record) = by_key.get(key) else {
                continue;
            };
            performance::record_cache_miss();

            emit(
                sink,
                ScanEventLevel::Info,
                format!(
                    "[{}/{}] scanning {}",
                    index + 1,
                    total,
                    record.archive_base_name
                ),
                CONTEXT,
            );

            match self
                .inspector
                .list_contents(game_code, &record.archive_path, task)
                .await
            {
                Ok(entries) => {
                    let matches = entries
                        .iter()
                        .filter(|entry| is_localization_entry(entry))
                        .count();
                    let has_loc = matches > 0;
                    outcome.has_localization.insert(key.clone(), has_loc);
                    outcome.probed += 1;
                    fresh.push((
                        key.clone(),
                        ScanCacheEntry {
                            id: uuid::Uuid::new_v4().to_string(),
                            archive_path: key.clone(),
                            last_modified: record.last_modified,
                            has_loc_content: has_loc,
                            scanned_at: chrono::Utc::now().timestamp(),
                        },
                    ));
                }
                Err(e) if e.is_cancelled() => {
                    cancelled = Some(e);
                    break;
                }
                Err(e) => {
                    outcome.skipped += 1;
                    emit(
                        sink,
                        ScanEventLevel::Warning,
                        format!("Could not scan {}: {}", record.archive_base_name, e),
                        CONTEXT,
                    );
                }
            }
        }

        if !fresh.is_empty() {
            if let Err(e) = self.cache.upsert_many(fresh).await {
                logger::log_warn(
                    &format!("Failed to store scan results: {}", e),
                    Some(CONTEXT),
                );
            }
        }

        match cancelled {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }
}
