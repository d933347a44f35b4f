//! Applies a diff to the translation store
//!
//! Each public operation runs in its own transaction; `apply_all` runs all four in
//! one. Every operation is idempotent per key: applying the same diff twice changes
//! nothing the second time.

use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use std::collections::HashSet;

use crate::data::database::{now_epoch, NewUnitRow, ProjectQueries, TranslationQueries};
use crate::error::{ApiError, ApiResult};
use crate::logger;
use crate::models::{DiffResult, ReconciliationReport};

const CONTEXT: &str = "reconcile";

fn sorted_keys(keys: &HashSet<String>) -> Vec<String> {
    let mut keys: Vec<String> = keys.iter().cloned().collect();
    keys.sort();
    keys
}

async fn ensure_project<C>(conn: &C, project_id: &str) -> ApiResult<()>
where
    C: ConnectionTrait,
{
    match ProjectQueries::find_by_id(conn, project_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::not_found(format!(
            "Project {} not found",
            project_id
        ))),
    }
}

async fn add_new_units_in<C>(conn: &C, project_id: &str, diff: &DiffResult) -> ApiResult<usize>
where
    C: ConnectionTrait,
{
    if diff.new_units_data.is_empty() {
        return Ok(0);
    }
    ensure_project(conn, project_id).await?;

    let mut seen = HashSet::new();
    let candidates: Vec<_> = diff
        .new_units_data
        .iter()
        .filter(|unit| seen.insert(unit.key.clone()))
        .collect();
    let keys: Vec<String> = candidates.iter().map(|unit| unit.key.clone()).collect();

    // Re-check right before inserting; the diff may be older than the store
    let existing = TranslationQueries::unit_ids_by_key(conn, project_id, &keys).await?;
    let rows: Vec<NewUnitRow> = candidates
        .into_iter()
        .filter(|unit| !existing.contains_key(&unit.key))
        .map(|unit| NewUnitRow {
            id: uuid::Uuid::new_v4().to_string(),
            key: unit.key.clone(),
            source_text: unit.source_text.clone(),
            source_loc_file: unit.source_loc_file.clone(),
        })
        .collect();

    let skipped = keys.len() - rows.len();
    if skipped > 0 {
        crate::log_debug!(
            &format!("{} new units already exist in {}", skipped, project_id),
            CONTEXT
        );
    }
    if rows.is_empty() {
        return Ok(0);
    }

    let now = now_epoch();
    TranslationQueries::insert_units(conn, project_id, &rows, now).await?;

    let row_keys: Vec<String> = rows.iter().map(|row| row.key.clone()).collect();
    let stored = TranslationQueries::unit_ids_by_key(conn, project_id, &row_keys).await?;
    let inserted_ids: Vec<String> = rows
        .iter()
        .filter(|row| stored.get(&row.key) == Some(&row.id))
        .map(|row| row.id.clone())
        .collect();

    let language_ids = ProjectQueries::language_ids(conn, project_id).await?;
    if language_ids.is_empty() {
        logger::log_warn(
            &format!(
                "Project {} has no languages; {} units added without versions",
                project_id,
                inserted_ids.len()
            ),
            Some(CONTEXT),
        );
    } else {
        TranslationQueries::insert_pending_versions(conn, &inserted_ids, &language_ids, now)
            .await?;
    }

    Ok(inserted_ids.len())
}

async fn apply_modified_in<C>(conn: &C, project_id: &str, diff: &DiffResult) -> ApiResult<usize>
where
    C: ConnectionTrait,
{
    if diff.modified_source_texts.is_empty() {
        return Ok(0);
    }

    let now = now_epoch();
    let mut keys: Vec<&String> = diff.modified_source_texts.keys().collect();
    keys.sort();

    let mut changed_keys = Vec::new();
    for key in keys {
        let text = &diff.modified_source_texts[key];
        let affected =
            TranslationQueries::update_source_text(conn, project_id, key, text, now).await?;
        if affected > 0 {
            changed_keys.push(key.clone());
        }
    }
    if changed_keys.is_empty() {
        return Ok(0);
    }

    let unit_ids: Vec<String> = TranslationQueries::unit_ids_by_key(conn, project_id, &changed_keys)
        .await?
        .into_values()
        .collect();
    let reset = TranslationQueries::reset_versions_to_pending(conn, &unit_ids, now).await?;
    crate::log_debug!(
        &format!(
            "{} source texts changed, {} versions reset to pending",
            changed_keys.len(),
            reset
        ),
        CONTEXT
    );

    Ok(changed_keys.len())
}

async fn mark_removed_in<C>(conn: &C, project_id: &str, diff: &DiffResult) -> ApiResult<usize>
where
    C: ConnectionTrait,
{
    if diff.removed_unit_keys.is_empty() {
        return Ok(0);
    }
    let keys = sorted_keys(&diff.removed_unit_keys);
    let flipped =
        TranslationQueries::set_obsolete(conn, project_id, &keys, true, now_epoch()).await?;
    Ok(flipped as usize)
}

async fn reactivate_in<C>(conn: &C, project_id: &str, diff: &DiffResult) -> ApiResult<usize>
where
    C: ConnectionTrait,
{
    if diff.reactivated_unit_keys.is_empty() {
        return Ok(0);
    }
    let now = now_epoch();
    let keys = sorted_keys(&diff.reactivated_unit_keys);
    let flipped = TranslationQueries::set_obsolete(conn, project_id, &keys, false, now).await?;
    if flipped == 0 {
        return Ok(0);
    }

    // A unit that comes back with different text is treated like a modified one
    let mut rewritten = HashSet::new();
    for key in &keys {
        if let Some(text) = diff.reactivated_source_texts.get(key) {
            if TranslationQueries::update_source_text(conn, project_id, key, text, now).await? > 0
            {
                rewritten.insert(key.clone());
            }
        }
    }

    let unit_ids = TranslationQueries::unit_ids_by_key(conn, project_id, &keys).await?;
    let (reset_ids, review_ids): (Vec<_>, Vec<_>) = unit_ids
        .into_iter()
        .partition(|(key, _)| rewritten.contains(key));
    let reset_ids: Vec<String> = reset_ids.into_iter().map(|(_, id)| id).collect();
    let review_ids: Vec<String> = review_ids.into_iter().map(|(_, id)| id).collect();

    if !reset_ids.is_empty() {
        TranslationQueries::reset_versions_to_pending(conn, &reset_ids, now).await?;
    }
    TranslationQueries::flag_translated_versions_for_review(conn, &review_ids, now).await?;
    Ok(flipped as usize)
}

pub struct ReconciliationApplier {
    conn: DatabaseConnection,
}

impl ReconciliationApplier {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert units for new keys plus one pending version per project language
    pub async fn add_new_units(&self, project_id: &str, diff: &DiffResult) -> ApiResult<usize> {
        let txn = self.conn.begin().await.map_err(ApiError::from)?;
        let added = add_new_units_in(&txn, project_id, diff).await?;
        txn.commit().await.map_err(ApiError::from)?;
        Ok(added)
    }

    /// Store new source texts; every version of a changed unit goes back to pending
    pub async fn apply_modified_source_texts(
        &self,
        project_id: &str,
        diff: &DiffResult,
    ) -> ApiResult<usize> {
        let txn = self.conn.begin().await.map_err(ApiError::from)?;
        let modified = apply_modified_in(&txn, project_id, diff).await?;
        txn.commit().await.map_err(ApiError::from)?;
        Ok(modified)
    }

    pub async fn mark_removed_units_obsolete(
        &self,
        project_id: &str,
        diff: &DiffResult,
    ) -> ApiResult<usize> {
        let txn = self.conn.begin().await.map_err(ApiError::from)?;
        let obsoleted = mark_removed_in(&txn, project_id, diff).await?;
        txn.commit().await.map_err(ApiError::from)?;
        Ok(obsoleted)
    }

    /// Clear the obsolete flag; translated versions are flagged for review
    pub async fn reactivate_obsolete_units(
        &self,
        project_id: &str,
        diff: &DiffResult,
    ) -> ApiResult<usize> {
        let txn = self.conn.begin().await.map_err(ApiError::from)?;
        let reactivated = reactivate_in(&txn, project_id, diff).await?;
        txn.commit().await.map_err(ApiError::from)?;
        Ok(reactivated)
    }

    /// new -> modified -> removed -> reactivated, all or nothing
    pub async fn apply_all(
        &self,
        project_id: &str,
        diff: &DiffResult,
    ) -> ApiResult<ReconciliationReport> {
        let txn = self.conn.begin().await.map_err(ApiError::from)?;
        let report = ReconciliationReport {
            added: add_new_units_in(&txn, project_id, diff).await?,
            modified: apply_modified_in(&txn, project_id, diff).await?,
            obsoleted: mark_removed_in(&txn, project_id, diff).await?,
            reactivated: reactivate_in(&txn, project_id, diff).await?,
        };
        txn.commit().await.map_err(ApiError::from)?;

        logger::log_info(
            &format!(
                "Project {}: {} added, {} modified, {} obsolete, {} reactivated",
                project_id,
                report.added,
                report.modified,
                report.obsoleted,
                report.reactivated
            ),
            Some(CONTEXT),
        );
        Ok(report)
    }
}
