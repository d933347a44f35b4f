//! Workshop mod update detection
//!
//! One scan pass walks the game's Workshop folder, keeps the packs that carry
//! localization, merges remote metadata and, for every mod imported as a project,
//! decides whether its pack has to be diffed and reconciled again.
//!
//! The remote-update watermark (`projects.source_mod_updated`) only moves forward on
//! a pass that finds nothing left to reconcile. A pass that applies changes leaves it
//! where it was, so the next pass diffs again and confirms the store is clean first.

use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::metadata::RemoteMetadataMerger;
use super::reconciliation::ReconciliationApplier;
use crate::analysis::inventory::{inspect_mod_folder_async, scan_workshop_root_async};
use crate::analysis::{DiffAnalyzer, LocalizationContentProbe};
use crate::config::SyncConfig;
use crate::core::cache::{CacheValidity, KeyedCache};
use crate::core::performance;
use crate::core::task_control::TaskControl;
use crate::data::database::{
    now_epoch, GameInstallationQueries, ProjectQueries, SqlAnalysisCache, SqlScanCache,
    WorkshopModQueries,
};
use crate::error::{ApiError, ApiResult};
use crate::logger;
use crate::models::{
    AnalysisCacheEntry, AnalysisCacheKey, DetectedModSummary, GameInstallation,
    MergedModMetadata, ModArchiveRecord, ModUpdateStatus, PendingChangesSummary, Project,
    ReconciliationReport, ScanCacheEntry, ScanModsOutcome,
};
use crate::progress::{emit, ScanEventLevel, ScanEventSink, SilentSink};
use crate::services::{RemoteCatalog, SteamWorkshopCatalog};
use crate::tools::{ArchiveExtractor, ArchiveInspector, RpfmCli, TabularParser, TsvLocParser};

const CONTEXT: &str = "update_detection";

/// External collaborators of a detector
pub struct DetectorParts {
    pub inspector: Arc<dyn ArchiveInspector>,
    pub extractor: Arc<dyn ArchiveExtractor>,
    pub parser: Arc<dyn TabularParser>,
    pub catalog: Arc<dyn RemoteCatalog>,
    pub scan_cache: Arc<dyn KeyedCache<String, ScanCacheEntry>>,
    pub analysis_cache: Arc<dyn KeyedCache<AnalysisCacheKey, AnalysisCacheEntry>>,
    pub temp_root: PathBuf,
}

/// Result of one mod's state machine step
struct ModResolution {
    status: ModUpdateStatus,
    pending_changes: Option<PendingChangesSummary>,
    report: Option<ReconciliationReport>,
}

impl ModResolution {
    fn plain(status: ModUpdateStatus) -> Self {
        Self {
            status,
            pending_changes: None,
            report: None,
        }
    }
}

pub struct ModUpdateDetector {
    conn: DatabaseConnection,
    probe: LocalizationContentProbe,
    merger: RemoteMetadataMerger,
    analyzer: DiffAnalyzer,
    applier: ReconciliationApplier,
    analysis_cache: Arc<dyn KeyedCache<AnalysisCacheKey, AnalysisCacheEntry>>,
    sink: Arc<dyn ScanEventSink>,
}

impl ModUpdateDetector {
    pub fn new(conn: DatabaseConnection, parts: DetectorParts) -> Self {
        Self {
            probe: LocalizationContentProbe::new(parts.inspector, parts.scan_cache),
            merger: RemoteMetadataMerger::new(conn.clone(), parts.catalog),
            analyzer: DiffAnalyzer::new(
                conn.clone(),
                parts.extractor,
                parts.parser,
                parts.temp_root,
            ),
            applier: ReconciliationApplier::new(conn.clone()),
            analysis_cache: parts.analysis_cache,
            sink: Arc::new(SilentSink),
            conn,
        }
    }

    /// Production wiring: RPFM command line tool, Steam Web API, SQLite caches
    pub fn from_config(config: &SyncConfig, conn: DatabaseConnection) -> ApiResult<Self> {
        let rpfm = Arc::new(RpfmCli::new(config));
        let parts = DetectorParts {
            inspector: rpfm.clone(),
            extractor: rpfm,
            parser: Arc::new(TsvLocParser::new()),
            catalog: Arc::new(SteamWorkshopCatalog::new(config)?),
            scan_cache: Arc::new(SqlScanCache::new(conn.clone())),
            analysis_cache: Arc::new(SqlAnalysisCache::new(conn.clone())),
            temp_root: config.extraction_temp_dir(),
        };
        Ok(Self::new(conn, parts))
    }

    pub fn with_sink(mut self, sink: Arc<dyn ScanEventSink>) -> Self {
        self.sink = sink;
        self
    }

    fn report(&self, level: ScanEventLevel, message: String) {
        emit(self.sink.as_ref(), level, message, CONTEXT);
    }

    async fn installation_by_code(&self, game_code: &str) -> ApiResult<GameInstallation> {
        GameInstallationQueries::find_by_code(&self.conn, game_code)
            .await?
            .ok_or_else(|| {
                ApiError::not_found(format!("Game installation {} not found", game_code))
            })
    }

    /// Scan every Workshop mod of a game and bring imported projects up to date.
    ///
    /// Failures of a single mod are logged and reported as `AnalysisFailed`; only
    /// cancellation, a missing installation or an unreadable project table abort
    /// the pass.
    pub async fn scan_mods(
        &self,
        game_code: &str,
        task: &TaskControl,
    ) -> ApiResult<ScanModsOutcome> {
        let installation = self.installation_by_code(game_code).await?;

        let Some(workshop_root) = installation
            .workshop_path
            .as_deref()
            .map(PathBuf::from)
            .filter(|path| path.is_dir())
        else {
            self.report(
                ScanEventLevel::Warning,
                format!("No Workshop folder found for {}", game_code),
            );
            return Ok(ScanModsOutcome::default());
        };

        let records = scan_workshop_root_async(workshop_root).await?;
        self.report(
            ScanEventLevel::Info,
            format!("Found {} Workshop mods", records.len()),
        );
        task.ensure_not_cancelled("Mod scan")?;

        let probed = self
            .probe
            .probe_all(game_code, &records, self.sink.as_ref(), task)
            .await?;
        let records = probed.with_localization(&records);
        self.report(
            ScanEventLevel::Info,
            format!("{} mods contain localization files", records.len()),
        );
        task.ensure_not_cancelled("Mod scan")?;

        let mut metadata = self
            .merger
            .merge(&records, installation.steam_app_id.as_deref())
            .await;
        let projects = self.index_projects(
            ProjectQueries::find_imported_by_game(&self.conn, &installation.id).await?,
        );
        let cached_analyses = self.load_analyses(&records, &projects).await;

        let mut outcome = ScanModsOutcome::default();
        let total = records.len();
        for (index, record) in records.iter().enumerate() {
            task.ensure_not_cancelled("Mod scan")?;

            let Some(meta) = metadata.remove(&record.workshop_id) else {
                logger::log_warn(
                    &format!("No metadata for mod {}, skipping", record.workshop_id),
                    Some(CONTEXT),
                );
                continue;
            };
            let project = projects.get(&record.workshop_id);

            let resolution = match project {
                Some(project) => {
                    let key = AnalysisCacheKey::new(project.id.clone(), record.archive_key());
                    self.resolve_imported(
                        &installation.game_code,
                        record,
                        &meta,
                        project,
                        cached_analyses.get(&key),
                        task,
                    )
                    .await?
                }
                None => ModResolution::plain(ModUpdateStatus::NotImported),
            };

            if resolution.report.is_some_and(|report| !report.is_noop()) {
                outcome.translation_stats_changed = true;
            }
            crate::log_debug!(
                &format!(
                    "[{}/{}] {} -> {:?}",
                    index + 1,
                    total,
                    meta.title,
                    resolution.status
                ),
                CONTEXT
            );
            outcome
                .mods
                .push(summarize(record, meta, project, resolution));
        }

        let with_changes = outcome
            .mods
            .iter()
            .filter(|m| m.status == ModUpdateStatus::HasChanges)
            .count();
        self.report(
            ScanEventLevel::Info,
            format!(
                "Scan complete: {} mods, {} with changes",
                outcome.mods.len(),
                with_changes
            ),
        );
        let counters = performance::snapshot();
        crate::log_debug!(
            &format!(
                "Scan cache hit rate {:.0}%, {} tool runs so far",
                counters.hit_rate() * 100.0,
                counters.tool_invocations
            ),
            CONTEXT
        );
        Ok(outcome)
    }

    /// Imported projects by Workshop id. Several projects may import the same mod;
    /// the oldest one is kept up to date and the others are reported.
    fn index_projects(&self, projects: Vec<Project>) -> HashMap<String, Project> {
        let mut indexed: HashMap<String, Project> = HashMap::with_capacity(projects.len());
        for project in projects {
            let Some(mod_id) = project.mod_steam_id.clone() else {
                continue;
            };
            match indexed.get(&mod_id) {
                Some(kept) => self.report(
                    ScanEventLevel::Warning,
                    format!(
                        "Project {} also imports Workshop mod {}; only {} is kept up to date",
                        project.name, mod_id, kept.name
                    ),
                ),
                None => {
                    indexed.insert(mod_id, project);
                }
            }
        }
        indexed
    }

    /// Cached analyses of imported mods in one round trip; failures read as empty
    async fn load_analyses(
        &self,
        records: &[ModArchiveRecord],
        projects: &HashMap<String, Project>,
    ) -> HashMap<AnalysisCacheKey, AnalysisCacheEntry> {
        let keys: Vec<AnalysisCacheKey> = records
            .iter()
            .filter_map(|record| {
                projects
                    .get(&record.workshop_id)
                    .map(|project| AnalysisCacheKey::new(project.id.clone(), record.archive_key()))
            })
            .collect();
        if keys.is_empty() {
            return HashMap::new();
        }
        match self.analysis_cache.get_many(&keys).await {
            Ok(found) => found,
            Err(e) => {
                logger::log_warn(
                    &format!("Analysis cache unavailable, analyzing everything: {}", e),
                    Some(CONTEXT),
                );
                HashMap::new()
            }
        }
    }

    async fn resolve_imported(
        &self,
        game_code: &str,
        record: &ModArchiveRecord,
        meta: &MergedModMetadata,
        project: &Project,
        cached: Option<&AnalysisCacheEntry>,
        task: &TaskControl,
    ) -> ApiResult<ModResolution> {
        let remote_time = meta.time_updated;
        let local_up_to_date = remote_time.map_or(true, |remote| record.last_modified >= remote);
        if !local_up_to_date {
            self.report(
                ScanEventLevel::Info,
                format!("{}: Workshop has a newer version, download it first", meta.title),
            );
            return Ok(ModResolution::plain(ModUpdateStatus::NeedsDownload));
        }

        let new_remote_update =
            remote_time.is_some_and(|remote| project.source_mod_updated != Some(remote));
        let valid_cache = cached.filter(|entry| entry.is_valid_for(record.last_modified));

        match valid_cache {
            Some(entry) if !new_remote_update => {
                let summary = entry.summary();
                let status = if summary.has_changes() {
                    ModUpdateStatus::HasChanges
                } else {
                    ModUpdateStatus::UpToDate
                };
                Ok(ModResolution {
                    status,
                    pending_changes: summary.has_changes().then_some(summary),
                    report: None,
                })
            }
            _ => {
                self.analyze_and_apply(game_code, record, meta, project, task)
                    .await
            }
        }
    }

    /// Fresh diff of one mod, applied when it has changes
    async fn analyze_and_apply(
        &self,
        game_code: &str,
        record: &ModArchiveRecord,
        meta: &MergedModMetadata,
        project: &Project,
        task: &TaskControl,
    ) -> ApiResult<ModResolution> {
        self.report(
            ScanEventLevel::Info,
            format!("Analyzing changes in {}", meta.title),
        );
        let diff = match self
            .analyzer
            .analyze_for_game(game_code, &project.id, &record.archive_path, task)
            .await
        {
            Ok(diff) => diff,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                self.report(
                    ScanEventLevel::Error,
                    format!("Analysis of {} failed: {}", meta.title, e),
                );
                return Ok(ModResolution::plain(ModUpdateStatus::AnalysisFailed));
            }
        };

        let key = AnalysisCacheKey::new(project.id.clone(), record.archive_key());
        let summary = diff.summary();

        if !diff.has_changes() {
            if let Some(remote) = meta.time_updated {
                if let Err(e) =
                    ProjectQueries::set_source_mod_updated(&self.conn, &project.id, remote).await
                {
                    logger::log_warn(
                        &format!("Failed to advance watermark of {}: {}", project.id, e),
                        Some(CONTEXT),
                    );
                }
            }
            self.store_analysis(&key, record.last_modified, &summary).await;
            return Ok(ModResolution::plain(ModUpdateStatus::UpToDate));
        }

        let report = match self.applier.apply_all(&project.id, &diff).await {
            Ok(report) => report,
            Err(e) => {
                self.report(
                    ScanEventLevel::Error,
                    format!("Applying changes to {} failed: {}", meta.title, e),
                );
                return Ok(ModResolution::plain(ModUpdateStatus::AnalysisFailed));
            }
        };

        if report.is_noop() {
            // Nothing stuck; keep the real counts so the next pass retries
            self.store_analysis(&key, record.last_modified, &summary).await;
        } else {
            self.report(
                ScanEventLevel::Info,
                format!(
                    "{}: {} new, {} modified, {} removed, {} restored",
                    meta.title,
                    report.added,
                    report.modified,
                    report.obsoleted,
                    report.reactivated
                ),
            );
            self.store_analysis(&key, record.last_modified, &summary.cleared())
                .await;
        }

        Ok(ModResolution {
            status: ModUpdateStatus::HasChanges,
            pending_changes: Some(summary),
            report: Some(report),
        })
    }

    async fn store_analysis(
        &self,
        key: &AnalysisCacheKey,
        last_modified: i64,
        summary: &PendingChangesSummary,
    ) {
        let entry = AnalysisCacheEntry::from_summary(key, last_modified, summary, now_epoch());
        if let Err(e) = self.analysis_cache.upsert(key.clone(), entry).await {
            logger::log_warn(
                &format!("Failed to cache analysis for {}: {}", key.archive_path, e),
                Some(CONTEXT),
            );
        }
    }

    /// Project, its installation and its pack on disk
    async fn locate_project_pack(
        &self,
        project_id: &str,
    ) -> ApiResult<(Project, GameInstallation, ModArchiveRecord)> {
        let project = ProjectQueries::find_by_id(&self.conn, project_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Project {} not found", project_id)))?;
        let workshop_id = project.mod_steam_id.clone().ok_or_else(|| {
            ApiError::validation(format!("Project {} is not linked to a Workshop mod", project_id))
        })?;
        let installation =
            GameInstallationQueries::find_by_id(&self.conn, &project.game_installation_id)
                .await?
                .ok_or_else(|| {
                    ApiError::not_found(format!(
                        "Game installation {} not found",
                        project.game_installation_id
                    ))
                })?;
        let root = installation.workshop_path.clone().ok_or_else(|| {
            ApiError::not_found(format!(
                "No Workshop folder configured for {}",
                installation.game_code
            ))
        })?;
        let record = inspect_mod_folder_async(PathBuf::from(root), workshop_id.clone())
            .await?
            .ok_or_else(|| {
                ApiError::not_found(format!("No pack file for Workshop mod {}", workshop_id))
            })?;
        Ok((project, installation, record))
    }

    /// Accept the current pack as reconciled: advance the watermark to the known
    /// remote time and clear the cached pending counts.
    pub async fn dismiss_pending_changes(&self, project_id: &str) -> ApiResult<()> {
        let (project, _installation, record) = self.locate_project_pack(project_id).await?;

        if let Some(workshop_id) = project.mod_steam_id.as_deref() {
            if let Some(remote) = WorkshopModQueries::get(&self.conn, workshop_id).await? {
                ProjectQueries::set_source_mod_updated(&self.conn, &project.id, remote.time_updated)
                    .await?;
            }
        }

        let key = AnalysisCacheKey::new(project.id.clone(), record.archive_key());
        let cleared = self
            .analysis_cache
            .get(&key)
            .await?
            .map(|entry| entry.summary().cleared())
            .unwrap_or_default();
        let entry =
            AnalysisCacheEntry::from_summary(&key, record.last_modified, &cleared, now_epoch());
        self.analysis_cache.upsert(key, entry).await?;

        logger::log_info(
            &format!("Dismissed pending changes of project {}", project.id),
            Some(CONTEXT),
        );
        Ok(())
    }

    /// Diff and apply one project's pack regardless of caches or watermark
    pub async fn reanalyze_project(
        &self,
        project_id: &str,
        task: &TaskControl,
    ) -> ApiResult<ReconciliationReport> {
        let (project, installation, record) = self.locate_project_pack(project_id).await?;
        let diff = self
            .analyzer
            .analyze_for_game(
                &installation.game_code,
                &project.id,
                &record.archive_path,
                task,
            )
            .await?;
        let report = self.applier.apply_all(&project.id, &diff).await?;

        let summary = diff.summary();
        let stored = if report.is_noop() && diff.has_changes() {
            summary
        } else {
            summary.cleared()
        };
        let key = AnalysisCacheKey::new(project.id.clone(), record.archive_key());
        self.store_analysis(&key, record.last_modified, &stored).await;
        Ok(report)
    }
}

fn summarize(
    record: &ModArchiveRecord,
    meta: MergedModMetadata,
    project: Option<&Project>,
    resolution: ModResolution,
) -> DetectedModSummary {
    let image = meta.preview_url.clone().or_else(|| {
        record
            .image_path
            .as_deref()
            .map(|path| path.to_string_lossy().into_owned())
    });
    DetectedModSummary {
        workshop_id: record.workshop_id.clone(),
        title: meta.title,
        image,
        archive_path: record.archive_path.to_string_lossy().into_owned(),
        local_last_modified: record.last_modified,
        remote_time_updated: meta.time_updated,
        subscriptions: meta.subscriptions,
        metadata_source: meta.source,
        project_id: project.map(|p| p.id.clone()),
        status: resolution.status,
        pending_changes: resolution.pending_changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::inventory::last_modified_secs;
    use crate::core::path_utils::path_key;
    use crate::data::database::TranslationQueries;
    use crate::error::ApiErrorCode;
    use crate::progress::MemorySink;
    use crate::test_support::{
        insert_project, remote_record, seed_units, seeded_database, set_workshop_path,
        FakeCatalog, FakeExtractor, FakeInspector, Fixture,
    };
    use std::path::Path;
    use tempfile::TempDir;

    struct Harness {
        conn: DatabaseConnection,
        fixture: Fixture,
        root: TempDir,
        temp: TempDir,
        pack: PathBuf,
        mtime: i64,
        inspector: Arc<FakeInspector>,
        extractor: Arc<FakeExtractor>,
        catalog: Arc<FakeCatalog>,
        analysis_cache: Arc<SqlAnalysisCache>,
        sink: Arc<MemorySink>,
        detector: ModUpdateDetector,
    }

    impl Harness {
        fn cache_key(&self) -> AnalysisCacheKey {
            AnalysisCacheKey::new(self.fixture.project_id.clone(), path_key(&self.pack))
        }

        async fn watermark(&self) -> Option<i64> {
            ProjectQueries::find_by_id(&self.conn, &self.fixture.project_id)
                .await
                .unwrap()
                .unwrap()
                .source_mod_updated
        }

        async fn cached(&self) -> Option<AnalysisCacheEntry> {
            self.analysis_cache.get(&self.cache_key()).await.unwrap()
        }

        async fn scan(&self) -> ScanModsOutcome {
            self.detector
                .scan_mods("wh3", &TaskControl::new())
                .await
                .unwrap()
        }
    }

    fn write_pack(root: &Path, workshop_id: &str, name: &str) -> PathBuf {
        let dir = root.join(workshop_id);
        std::fs::create_dir_all(&dir).unwrap();
        let pack = dir.join(name);
        std::fs::write(&pack, b"PFH5").unwrap();
        pack
    }

    /// Mod 5 on disk with localization, published remotely at its own mtime
    async fn harness() -> Harness {
        let (conn, fixture) = seeded_database().await;
        let root = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        set_workshop_path(&conn, &fixture, root.path()).await;

        let pack = write_pack(root.path(), "5", "my_mod.pack");
        let mtime = last_modified_secs(&pack).unwrap();
        let pack_str = pack.to_string_lossy().into_owned();

        let inspector = Arc::new(FakeInspector::new());
        inspector.set_contents(&pack_str, &["text/db/my_mod.loc", "db/units_tables/x"]);
        let extractor = Arc::new(FakeExtractor::new());
        extractor.set_pack(
            &pack_str,
            vec![("text/db/my_mod.loc.tsv", vec![("a", "hi"), ("b", "bye")])],
        );
        let catalog = Arc::new(FakeCatalog::new());
        catalog.set_record(remote_record("5", "My Mod", mtime));
        let analysis_cache = Arc::new(SqlAnalysisCache::new(conn.clone()));
        let sink = Arc::new(MemorySink::new());

        let detector = ModUpdateDetector::new(
            conn.clone(),
            DetectorParts {
                inspector: inspector.clone(),
                extractor: extractor.clone(),
                parser: Arc::new(TsvLocParser::new()),
                catalog: catalog.clone(),
                scan_cache: Arc::new(SqlScanCache::new(conn.clone())),
                analysis_cache: analysis_cache.clone(),
                temp_root: temp.path().to_path_buf(),
            },
        )
        .with_sink(sink.clone());

        Harness {
            conn,
            fixture,
            root,
            temp,
            pack,
            mtime,
            inspector,
            extractor,
            catalog,
            analysis_cache,
            sink,
            detector,
        }
    }

    fn pending(new_units: usize, removed_units: usize) -> PendingChangesSummary {
        PendingChangesSummary {
            new_units,
            removed_units,
            modified_units: 0,
            reactivated_units: 0,
            total_pack_units: 2,
            total_project_units: 2,
        }
    }

    #[tokio::test]
    async fn test_watermark_held_until_clean_pass() {
        let h = harness().await;
        seed_units(&h.conn, &h.fixture, &[("a", "hi"), ("c", "old")], &[]).await;

        let first = h.scan().await;
        assert_eq!(first.mods.len(), 1);
        let summary = &first.mods[0];
        assert_eq!(summary.status, ModUpdateStatus::HasChanges);
        assert_eq!(summary.project_id.as_deref(), Some(h.fixture.project_id.as_str()));
        let changes = summary.pending_changes.unwrap();
        assert_eq!((changes.new_units, changes.removed_units), (1, 1));
        assert!(first.translation_stats_changed);
        assert_eq!(h.watermark().await, None);
        assert!(!h.cached().await.unwrap().has_pending_changes());

        let active = TranslationQueries::active_source_texts(&h.conn, &h.fixture.project_id)
            .await
            .unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.contains_key("b"));

        // Second pass finds nothing left and only then advances the watermark
        let second = h.scan().await;
        assert_eq!(second.mods[0].status, ModUpdateStatus::UpToDate);
        assert!(!second.translation_stats_changed);
        assert_eq!(h.watermark().await, Some(h.mtime));
        assert_eq!(h.extractor.extract_calls(), 2);

        // Third pass trusts the cache
        let third = h.scan().await;
        assert_eq!(third.mods[0].status, ModUpdateStatus::UpToDate);
        assert_eq!(h.extractor.extract_calls(), 2);
        assert_eq!(h.inspector.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_clean_first_pass_advances_watermark() {
        let h = harness().await;
        seed_units(&h.conn, &h.fixture, &[("a", "hi"), ("b", "bye")], &[]).await;

        let outcome = h.scan().await;
        assert_eq!(outcome.mods[0].status, ModUpdateStatus::UpToDate);
        assert!(outcome.mods[0].pending_changes.is_none());
        assert_eq!(h.watermark().await, Some(h.mtime));
        let entry = h.cached().await.unwrap();
        assert_eq!(entry.last_modified, h.mtime);
        assert_eq!(entry.total_pack_units, 2);
    }

    #[tokio::test]
    async fn test_stale_local_pack_needs_download() {
        let h = harness().await;
        h.catalog.set_record(remote_record("5", "My Mod", h.mtime + 3600));

        let outcome = h.scan().await;
        assert_eq!(outcome.mods[0].status, ModUpdateStatus::NeedsDownload);
        assert_eq!(outcome.mods[0].remote_time_updated, Some(h.mtime + 3600));
        assert_eq!(h.extractor.extract_calls(), 0);
        assert!(h.cached().await.is_none());
        assert_eq!(h.watermark().await, None);
    }

    #[tokio::test]
    async fn test_extractor_failure_keeps_previous_state() {
        let h = harness().await;
        seed_units(&h.conn, &h.fixture, &[("a", "old text")], &[]).await;
        h.extractor.set_failing(true);

        let outcome = h.scan().await;
        assert_eq!(outcome.mods[0].status, ModUpdateStatus::AnalysisFailed);
        assert!(!outcome.translation_stats_changed);
        assert!(h.cached().await.is_none());
        assert_eq!(h.watermark().await, None);
        let unit = TranslationQueries::get_unit(&h.conn, &h.fixture.project_id, "a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unit.source_text, "old text");
        assert!(h
            .sink
            .messages()
            .iter()
            .any(|m| m.starts_with("Analysis of My Mod failed")));

        // Retried on the next pass
        h.extractor.set_failing(false);
        let retry = h.scan().await;
        assert_eq!(retry.mods[0].status, ModUpdateStatus::HasChanges);
    }

    #[tokio::test]
    async fn test_valid_cached_changes_are_reused() {
        let h = harness().await;
        ProjectQueries::set_source_mod_updated(&h.conn, &h.fixture.project_id, h.mtime)
            .await
            .unwrap();
        let key = h.cache_key();
        let entry = AnalysisCacheEntry::from_summary(&key, h.mtime, &pending(2, 0), 1);
        h.analysis_cache.upsert(key, entry).await.unwrap();

        let outcome = h.scan().await;
        assert_eq!(outcome.mods[0].status, ModUpdateStatus::HasChanges);
        assert_eq!(outcome.mods[0].pending_changes, Some(pending(2, 0)));
        assert_eq!(h.extractor.extract_calls(), 0);
    }

    #[tokio::test]
    async fn test_new_remote_update_beats_cached_changes() {
        let h = harness().await;
        seed_units(&h.conn, &h.fixture, &[("a", "hi"), ("b", "bye")], &[]).await;
        ProjectQueries::set_source_mod_updated(&h.conn, &h.fixture.project_id, h.mtime - 60)
            .await
            .unwrap();
        let key = h.cache_key();
        let entry = AnalysisCacheEntry::from_summary(&key, h.mtime, &pending(2, 0), 1);
        h.analysis_cache.upsert(key, entry).await.unwrap();

        let outcome = h.scan().await;
        assert_eq!(h.extractor.extract_calls(), 1);
        assert_eq!(outcome.mods[0].status, ModUpdateStatus::UpToDate);
        assert_eq!(h.watermark().await, Some(h.mtime));
    }

    #[tokio::test]
    async fn test_other_mods_are_listed_but_not_analyzed() {
        let h = harness().await;
        seed_units(&h.conn, &h.fixture, &[("a", "hi"), ("b", "bye")], &[]).await;
        let other = write_pack(h.root.path(), "6", "other_mod.pack");
        h.inspector
            .set_contents(&other.to_string_lossy(), &["text/db/other.loc"]);
        let plain = write_pack(h.root.path(), "7", "no_text.pack");
        h.inspector
            .set_contents(&plain.to_string_lossy(), &["db/units_tables/data"]);

        let outcome = h.scan().await;
        let ids: Vec<_> = outcome.mods.iter().map(|m| m.workshop_id.as_str()).collect();
        assert_eq!(ids, vec!["5", "6"]);

        let other = &outcome.mods[1];
        assert_eq!(other.status, ModUpdateStatus::NotImported);
        assert!(!other.is_imported());
        assert_eq!(other.title, "Other Mod");
        assert_eq!(other.metadata_source, crate::models::MetadataSource::Derived);
        assert_eq!(h.extractor.extract_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_workshop_folder_gives_empty_result() {
        let h = harness().await;
        let gone = h.root.path().join("missing");
        set_workshop_path(&h.conn, &h.fixture, &gone).await;

        let outcome = h.scan().await;
        assert!(outcome.mods.is_empty());
        assert!(h.sink.messages()[0].starts_with("No Workshop folder"));
    }

    #[tokio::test]
    async fn test_unknown_game_is_not_found() {
        let h = harness().await;
        let err = h
            .detector
            .scan_mods("attila", &TaskControl::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ApiErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_cancelled_scan_writes_nothing() {
        let h = harness().await;
        let task = TaskControl::new();
        task.cancel();
        let err = h.detector.scan_mods("wh3", &task).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(h.cached().await.is_none());
        assert_eq!(h.extractor.extract_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_extraction_leaves_store_untouched() {
        let h = harness().await;
        seed_units(&h.conn, &h.fixture, &[("a", "hi"), ("c", "old")], &[]).await;
        h.extractor.set_cancel_during_extraction(true);

        let err = h
            .detector
            .scan_mods("wh3", &TaskControl::new())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(h.extractor.extract_calls(), 1);
        assert!(h.cached().await.is_none());
        assert_eq!(h.watermark().await, None);

        let active = TranslationQueries::active_source_texts(&h.conn, &h.fixture.project_id)
            .await
            .unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active["c"], "old");
        assert!(!active.contains_key("b"));

        // Extraction folder was removed on the way out
        assert!(std::fs::read_dir(h.temp.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_reactivated_text_change_reaches_store_without_remote_data() {
        let h = harness().await;
        h.catalog.set_failing(true);
        seed_units(&h.conn, &h.fixture, &[("a", "hi")], &[("c", "old")]).await;
        h.extractor.set_pack(
            &h.pack.to_string_lossy(),
            vec![("text/db/my_mod.loc.tsv", vec![("a", "hi"), ("c", "new")])],
        );

        let first = h.scan().await;
        assert_eq!(first.mods[0].status, ModUpdateStatus::HasChanges);
        let unit = TranslationQueries::get_unit(&h.conn, &h.fixture.project_id, "c")
            .await
            .unwrap()
            .unwrap();
        assert!(!unit.is_obsolete);
        assert_eq!(unit.source_text, "new");

        let second = h.scan().await;
        assert_eq!(second.mods[0].status, ModUpdateStatus::UpToDate);
        let active = TranslationQueries::active_source_texts(&h.conn, &h.fixture.project_id)
            .await
            .unwrap();
        assert_eq!(active["c"], "new");
    }

    #[tokio::test]
    async fn test_second_project_on_same_mod_is_reported() {
        let h = harness().await;
        seed_units(&h.conn, &h.fixture, &[("a", "hi"), ("b", "bye")], &[]).await;
        insert_project(&h.conn, &h.fixture, "Mod Five Copy", Some("5")).await;

        let outcome = h.scan().await;
        assert_eq!(outcome.mods.len(), 1);
        assert!(outcome.mods[0].project_id.is_some());
        let warnings: Vec<String> = h
            .sink
            .events()
            .into_iter()
            .filter(|e| e.level == ScanEventLevel::Warning)
            .map(|e| e.message)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("also imports Workshop mod 5"));
    }

    #[tokio::test]
    async fn test_dismiss_pending_changes() {
        let h = harness().await;
        seed_units(&h.conn, &h.fixture, &[("a", "hi"), ("b", "bye")], &[]).await;
        WorkshopModQueries::upsert_many(&h.conn, &[remote_record("5", "My Mod", h.mtime)])
            .await
            .unwrap();
        let key = h.cache_key();
        let entry = AnalysisCacheEntry::from_summary(&key, h.mtime, &pending(3, 1), 1);
        h.analysis_cache.upsert(key, entry).await.unwrap();

        h.detector
            .dismiss_pending_changes(&h.fixture.project_id)
            .await
            .unwrap();
        assert_eq!(h.watermark().await, Some(h.mtime));
        let cleared = h.cached().await.unwrap();
        assert!(!cleared.has_pending_changes());
        assert_eq!(cleared.total_pack_units, 2);

        let outcome = h.scan().await;
        assert_eq!(outcome.mods[0].status, ModUpdateStatus::UpToDate);
        assert_eq!(h.extractor.extract_calls(), 0);

        let err = h.detector.dismiss_pending_changes("missing").await.unwrap_err();
        assert_eq!(err.code, ApiErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_reanalyze_project_applies_and_refreshes_cache() {
        let h = harness().await;
        seed_units(&h.conn, &h.fixture, &[("a", "hi"), ("c", "old")], &[]).await;

        let report = h
            .detector
            .reanalyze_project(&h.fixture.project_id, &TaskControl::new())
            .await
            .unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.obsoleted, 1);
        let entry = h.cached().await.unwrap();
        assert!(!entry.has_pending_changes());
        assert_eq!(entry.last_modified, h.mtime);
    }
}
