//! Pack vs. project diff
//!
//! `compute_diff` is the pure comparison; `DiffAnalyzer` loads the project side,
//! extracts the pack side and cleans up after itself.

use sea_orm::DatabaseConnection;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::path_utils::{relative_key, validate_child_path};
use crate::core::task_control::TaskControl;
use crate::data::database::{GameInstallationQueries, ProjectQueries, TranslationQueries};
use crate::error::{ApiError, ApiResult};
use crate::logger;
use crate::models::{DiffResult, NewUnitData};
use crate::tools::{ArchiveExtractor, LocEntry, TabularParser};

const CONTEXT: &str = "diff";

/// Merge parsed files into one unit list.
///
/// `files` must already be in processing order; the first occurrence of a key wins
/// and records its file as `source_loc_file`.
pub fn merge_pack_units(files: Vec<(String, Vec<LocEntry>)>) -> Vec<NewUnitData> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut units = Vec::new();
    for (source_file, entries) in files {
        for entry in entries {
            if seen.contains(&entry.key) {
                continue;
            }
            seen.insert(entry.key.clone());
            units.push(NewUnitData {
                key: entry.key,
                source_text: entry.value,
                source_loc_file: Some(source_file.clone()),
            });
        }
    }
    units
}

/// Categorize pack units against the active and obsolete units of a project.
///
/// Keys and texts compare by exact string equality. Unchanged keys are not reported.
/// A reactivated key whose pack text differs from the stored one also carries its
/// pack text in `reactivated_source_texts`.
pub fn compute_diff(
    pack_units: &[NewUnitData],
    active: &HashMap<String, String>,
    obsolete: &HashMap<String, String>,
) -> DiffResult {
    let mut diff = DiffResult {
        total_pack_units: pack_units.len(),
        total_project_units: active.len(),
        ..DiffResult::default()
    };
    let mut pack_keys: HashSet<&str> = HashSet::with_capacity(pack_units.len());

    for unit in pack_units {
        if !pack_keys.insert(unit.key.as_str()) {
            continue;
        }
        match active.get(&unit.key) {
            Some(current) if *current != unit.source_text => {
                diff.modified_unit_keys.insert(unit.key.clone());
                diff.modified_source_texts
                    .insert(unit.key.clone(), unit.source_text.clone());
            }
            Some(_) => {}
            None => match obsolete.get(&unit.key) {
                Some(stored) => {
                    diff.reactivated_unit_keys.insert(unit.key.clone());
                    if *stored != unit.source_text {
                        diff.reactivated_source_texts
                            .insert(unit.key.clone(), unit.source_text.clone());
                    }
                }
                None => {
                    diff.new_unit_keys.insert(unit.key.clone());
                    diff.new_units_data.push(unit.clone());
                }
            },
        }
    }

    for key in active.keys() {
        if !pack_keys.contains(key.as_str()) {
            diff.removed_unit_keys.insert(key.clone());
        }
    }

    diff
}

pub struct DiffAnalyzer {
    conn: DatabaseConnection,
    extractor: Arc<dyn ArchiveExtractor>,
    parser: Arc<dyn TabularParser>,
    temp_root: PathBuf,
}

impl DiffAnalyzer {
    pub fn new(
        conn: DatabaseConnection,
        extractor: Arc<dyn ArchiveExtractor>,
        parser: Arc<dyn TabularParser>,
        temp_root: PathBuf,
    ) -> Self {
        Self {
            conn,
            extractor,
            parser,
            temp_root,
        }
    }

    /// Diff a pack against a project, resolving the game from the project
    pub async fn analyze_changes(
        &self,
        project_id: &str,
        archive_path: &Path,
        task: &TaskControl,
    ) -> ApiResult<DiffResult> {
        let project = ProjectQueries::find_by_id(&self.conn, project_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Project {} not found", project_id)))?;
        let installation =
            GameInstallationQueries::find_by_id(&self.conn, &project.game_installation_id)
                .await?
                .ok_or_else(|| {
                    ApiError::not_found(format!(
                        "Game installation {} not found",
                        project.game_installation_id
                    ))
                })?;

        self.analyze_for_game(&installation.game_code, project_id, archive_path, task)
            .await
    }

    /// Diff a pack against a project whose game is already known.
    ///
    /// Fails as a whole when extraction fails; nothing is written anywhere.
    pub async fn analyze_for_game(
        &self,
        game_code: &str,
        project_id: &str,
        archive_path: &Path,
        task: &TaskControl,
    ) -> ApiResult<DiffResult> {
        task.ensure_not_cancelled("Diff analysis")?;

        let active = TranslationQueries::active_source_texts(&self.conn, project_id).await?;
        let obsolete = TranslationQueries::obsolete_source_texts(&self.conn, project_id).await?;

        tokio::fs::create_dir_all(&self.temp_root).await?;
        let temp_dir = tempfile::Builder::new()
            .prefix("twmt_diff_")
            .tempdir_in(&self.temp_root)
            .map_err(|e| ApiError::internal(format!("Failed to create temp dir: {}", e)))?;

        let pack_units = self
            .extract_pack_units(game_code, archive_path, temp_dir.path(), task)
            .await;

        let temp_path = temp_dir.path().to_path_buf();
        if let Err(e) = temp_dir.close() {
            logger::log_warn(
                &format!(
                    "Failed to remove extraction folder {}: {}",
                    temp_path.display(),
                    e
                ),
                Some(CONTEXT),
            );
        }

        let pack_units = pack_units.map_err(|e| {
            logger::log_error(
                &format!("Analysis of {} failed: {}", archive_path.display(), e),
                Some(CONTEXT),
            );
            e
        })?;

        let diff = compute_diff(&pack_units, &active, &obsolete);
        crate::log_debug!(
            &format!(
                "{}: {} new, {} removed, {} modified, {} reactivated ({} pack / {} project units)",
                archive_path.display(),
                diff.new_unit_keys.len(),
                diff.removed_unit_keys.len(),
                diff.modified_unit_keys.len(),
                diff.reactivated_unit_keys.len(),
                diff.total_pack_units,
                diff.total_project_units
            ),
            CONTEXT
        );
        Ok(diff)
    }

    async fn extract_pack_units(
        &self,
        game_code: &str,
        archive_path: &Path,
        output_dir: &Path,
        task: &TaskControl,
    ) -> ApiResult<Vec<NewUnitData>> {
        let extracted = self
            .extractor
            .extract_tabular(game_code, archive_path, output_dir, task)
            .await?;
        let base = extracted.output_directory.clone();

        let mut files: Vec<(String, PathBuf)> = extracted
            .extracted_files
            .into_iter()
            .map(|path| (relative_key(&base, &path), path))
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut parsed = Vec::with_capacity(files.len());
        for (relative, path) in files {
            task.ensure_not_cancelled("Diff analysis")?;

            let checked = match validate_child_path(&base, &path) {
                Ok(checked) => checked,
                Err(e) => {
                    logger::log_warn(
                        &format!("Skipping extracted file {}: {}", relative, e),
                        Some(CONTEXT),
                    );
                    continue;
                }
            };

            let parser = Arc::clone(&self.parser);
            let entries = tokio::task::spawn_blocking(move || parser.parse(&checked))
                .await
                .map_err(|e| ApiError::internal(format!("Parse task failed: {}", e)))?;

            match entries {
                Ok(entries) => parsed.push((relative, entries)),
                Err(e) => logger::log_warn(
                    &format!("Skipping unparseable file {}: {}", relative, e),
                    Some(CONTEXT),
                ),
            }
        }

        Ok(merge_pack_units(parsed))
    }
}
