use std::collections::HashMap;

use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use super::{INSERT_BATCH, IN_CLAUSE_CHUNK};
use crate::data::database::entities::{mod_scan_cache, mod_update_analysis_cache};
use crate::error::ApiError;
use crate::models::{AnalysisCacheEntry, AnalysisCacheKey, ScanCacheEntry};

fn scan_entry_from_model(model: mod_scan_cache::Model) -> ScanCacheEntry {
    ScanCacheEntry {
        id: model.id,
        archive_path: model.pack_file_path,
        last_modified: model.file_last_modified,
        has_loc_content: model.has_loc_files,
        scanned_at: model.scanned_at,
    }
}

fn analysis_entry_from_model(model: mod_update_analysis_cache::Model) -> AnalysisCacheEntry {
    AnalysisCacheEntry {
        id: model.id,
        project_id: model.project_id,
        archive_path: model.pack_file_path,
        last_modified: model.file_last_modified,
        new_count: model.new_units_count,
        removed_count: model.removed_units_count,
        modified_count: model.modified_units_count,
        reactivated_count: model.reactivated_units_count,
        total_pack_units: model.total_pack_units,
        total_project_units: model.total_project_units,
        analyzed_at: model.analyzed_at,
    }
}

/// Keep the last entry per key; SQLite rejects an upsert that touches a row twice
fn dedup_last_wins<K, V>(entries: Vec<(K, V)>) -> Vec<V>
where
    K: std::hash::Hash + Eq,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut values: Vec<Option<V>> = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        match positions.get(&key) {
            Some(&index) => values[index] = Some(value),
            None => {
                positions.insert(key, values.len());
                values.push(Some(value));
            }
        }
    }
    values.into_iter().flatten().collect()
}

/// Pack-file scan cache
pub struct ScanCacheQueries;

impl ScanCacheQueries {
    /// Bulk fetch keyed by archive path; unknown paths are simply absent
    pub async fn get_by_paths<C>(
        conn: &C,
        paths: &[String],
    ) -> Result<HashMap<String, ScanCacheEntry>, ApiError>
    where
        C: ConnectionTrait,
    {
        let mut result = HashMap::with_capacity(paths.len());
        for chunk in paths.chunks(IN_CLAUSE_CHUNK) {
            let rows = mod_scan_cache::Entity::find()
                .filter(mod_scan_cache::Column::PackFilePath.is_in(chunk.iter().cloned()))
                .all(conn)
                .await
                .map_err(ApiError::from)?;
            for row in rows {
                let entry = scan_entry_from_model(row);
                result.insert(entry.archive_path.clone(), entry);
            }
        }
        Ok(result)
    }

    /// Insert-or-replace keyed by archive path. The row id of an existing entry is kept.
    pub async fn upsert_batch<C>(conn: &C, entries: Vec<ScanCacheEntry>) -> Result<(), ApiError>
    where
        C: ConnectionTrait,
    {
        let entries = dedup_last_wins(
            entries
                .into_iter()
                .map(|entry| (entry.archive_path.clone(), entry))
                .collect(),
        );

        for batch in entries.chunks(INSERT_BATCH) {
            let models = batch.iter().map(|entry| mod_scan_cache::ActiveModel {
                id: Set(entry.id.clone()),
                pack_file_path: Set(entry.archive_path.clone()),
                file_last_modified: Set(entry.last_modified),
                has_loc_files: Set(entry.has_loc_content),
                scanned_at: Set(entry.scanned_at),
            });

            mod_scan_cache::Entity::insert_many(models)
                .on_conflict(
                    OnConflict::column(mod_scan_cache::Column::PackFilePath)
                        .update_columns([
                            mod_scan_cache::Column::FileLastModified,
                            mod_scan_cache::Column::HasLocFiles,
                            mod_scan_cache::Column::ScannedAt,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(conn)
                .await
                .map_err(ApiError::from)?;
        }
        Ok(())
    }
}

/// Per-project diff analysis cache
pub struct AnalysisCacheQueries;

impl AnalysisCacheQueries {
    pub async fn get<C>(
        conn: &C,
        project_id: &str,
        archive_path: &str,
    ) -> Result<Option<AnalysisCacheEntry>, ApiError>
    where
        C: ConnectionTrait,
    {
        let row = mod_update_analysis_cache::Entity::find()
            .filter(mod_update_analysis_cache::Column::ProjectId.eq(project_id))
            .filter(mod_update_analysis_cache::Column::PackFilePath.eq(archive_path))
            .one(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(row.map(analysis_entry_from_model))
    }

    /// Bulk fetch; one query per project and path chunk
    pub async fn get_many<C>(
        conn: &C,
        keys: &[AnalysisCacheKey],
    ) -> Result<HashMap<AnalysisCacheKey, AnalysisCacheEntry>, ApiError>
    where
        C: ConnectionTrait,
    {
        let mut by_project: HashMap<&str, Vec<String>> = HashMap::new();
        for key in keys {
            by_project
                .entry(key.project_id.as_str())
                .or_default()
                .push(key.archive_path.clone());
        }

        let mut result = HashMap::with_capacity(keys.len());
        for (project_id, paths) in by_project {
            for chunk in paths.chunks(IN_CLAUSE_CHUNK) {
                let rows = mod_update_analysis_cache::Entity::find()
                    .filter(mod_update_analysis_cache::Column::ProjectId.eq(project_id))
                    .filter(
                        mod_update_analysis_cache::Column::PackFilePath
                            .is_in(chunk.iter().cloned()),
                    )
                    .all(conn)
                    .await
                    .map_err(ApiError::from)?;
                for row in rows {
                    let entry = analysis_entry_from_model(row);
                    result.insert(entry.key(), entry);
                }
            }
        }
        Ok(result)
    }

    pub async fn upsert_many<C>(
        conn: &C,
        entries: Vec<AnalysisCacheEntry>,
    ) -> Result<(), ApiError>
    where
        C: ConnectionTrait,
    {
        let entries = dedup_last_wins(
            entries
                .into_iter()
                .map(|entry| (entry.key(), entry))
                .collect(),
        );

        for batch in entries.chunks(INSERT_BATCH) {
            let models = batch
                .iter()
                .map(|entry| mod_update_analysis_cache::ActiveModel {
                    id: Set(entry.id.clone()),
                    project_id: Set(entry.project_id.clone()),
                    pack_file_path: Set(entry.archive_path.clone()),
                    file_last_modified: Set(entry.last_modified),
                    new_units_count: Set(entry.new_count),
                    removed_units_count: Set(entry.removed_count),
                    modified_units_count: Set(entry.modified_count),
                    reactivated_units_count: Set(entry.reactivated_count),
                    total_pack_units: Set(entry.total_pack_units),
                    total_project_units: Set(entry.total_project_units),
                    analyzed_at: Set(entry.analyzed_at),
                });

            mod_update_analysis_cache::Entity::insert_many(models)
                .on_conflict(
                    OnConflict::columns([
                        mod_update_analysis_cache::Column::ProjectId,
                        mod_update_analysis_cache::Column::PackFilePath,
                    ])
                    .update_columns([
                        mod_update_analysis_cache::Column::FileLastModified,
                        mod_update_analysis_cache::Column::NewUnitsCount,
                        mod_update_analysis_cache::Column::RemovedUnitsCount,
                        mod_update_analysis_cache::Column::ModifiedUnitsCount,
                        mod_update_analysis_cache::Column::ReactivatedUnitsCount,
                        mod_update_analysis_cache::Column::TotalPackUnits,
                        mod_update_analysis_cache::Column::TotalProjectUnits,
                        mod_update_analysis_cache::Column::AnalyzedAt,
                    ])
                    .to_owned(),
                )
                .exec_without_returning(conn)
                .await
                .map_err(ApiError::from)?;
        }
        Ok(())
    }

    /// Number of cache rows for a project
    #[cfg(test)]
    pub async fn count_for_project<C>(conn: &C, project_id: &str) -> Result<u64, ApiError>
    where
        C: ConnectionTrait,
    {
        use sea_orm::PaginatorTrait;
        mod_update_analysis_cache::Entity::find()
            .filter(mod_update_analysis_cache::Column::ProjectId.eq(project_id))
            .count(conn)
            .await
            .map_err(ApiError::from)
    }
}
