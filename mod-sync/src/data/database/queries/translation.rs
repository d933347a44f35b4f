use std::collections::HashMap;

use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set};

use super::{INSERT_BATCH, IN_CLAUSE_CHUNK};
use crate::data::database::entities::{translation_units, translation_versions};
use crate::error::ApiError;
use crate::models::TranslationStatus;

/// A translation unit about to be inserted, with its pre-generated id
#[derive(Debug, Clone)]
pub struct NewUnitRow {
    pub id: String,
    pub key: String,
    pub source_text: String,
    pub source_loc_file: Option<String>,
}

/// Translation units and their per-language versions
pub struct TranslationQueries;

impl TranslationQueries {
    /// `key -> source_text` for every non-obsolete unit of a project
    pub async fn active_source_texts<C>(
        conn: &C,
        project_id: &str,
    ) -> Result<HashMap<String, String>, ApiError>
    where
        C: ConnectionTrait,
    {
        let rows = translation_units::Entity::find()
            .select_only()
            .column(translation_units::Column::Key)
            .column(translation_units::Column::SourceText)
            .filter(translation_units::Column::ProjectId.eq(project_id))
            .filter(translation_units::Column::IsObsolete.eq(false))
            .into_tuple::<(String, String)>()
            .all(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(rows.into_iter().collect())
    }

    /// `key -> source_text` for every obsolete unit of a project
    pub async fn obsolete_source_texts<C>(
        conn: &C,
        project_id: &str,
    ) -> Result<HashMap<String, String>, ApiError>
    where
        C: ConnectionTrait,
    {
        let rows = translation_units::Entity::find()
            .select_only()
            .column(translation_units::Column::Key)
            .column(translation_units::Column::SourceText)
            .filter(translation_units::Column::ProjectId.eq(project_id))
            .filter(translation_units::Column::IsObsolete.eq(true))
            .into_tuple::<(String, String)>()
            .all(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(rows.into_iter().collect())
    }

    /// `key -> unit id` for the given keys, obsolete or not
    pub async fn unit_ids_by_key<C>(
        conn: &C,
        project_id: &str,
        keys: &[String],
    ) -> Result<HashMap<String, String>, ApiError>
    where
        C: ConnectionTrait,
    {
        let mut result = HashMap::with_capacity(keys.len());
        for chunk in keys.chunks(IN_CLAUSE_CHUNK) {
            let rows = translation_units::Entity::find()
                .select_only()
                .column(translation_units::Column::Key)
                .column(translation_units::Column::Id)
                .filter(translation_units::Column::ProjectId.eq(project_id))
                .filter(translation_units::Column::Key.is_in(chunk.iter().cloned()))
                .into_tuple::<(String, String)>()
                .all(conn)
                .await
                .map_err(ApiError::from)?;
            result.extend(rows);
        }
        Ok(result)
    }

    /// Inserts units, ignoring keys that already exist. Returns rows inserted.
    pub async fn insert_units<C>(
        conn: &C,
        project_id: &str,
        units: &[NewUnitRow],
        now: i64,
    ) -> Result<u64, ApiError>
    where
        C: ConnectionTrait,
    {
        let mut inserted = 0;
        for batch in units.chunks(INSERT_BATCH) {
            let models = batch.iter().map(|unit| translation_units::ActiveModel {
                id: Set(unit.id.clone()),
                project_id: Set(project_id.to_string()),
                key: Set(unit.key.clone()),
                source_text: Set(unit.source_text.clone()),
                source_loc_file: Set(unit.source_loc_file.clone()),
                is_obsolete: Set(false),
                created_at: Set(now),
                updated_at: Set(now),
            });

            inserted += translation_units::Entity::insert_many(models)
                .on_conflict(
                    OnConflict::columns([
                        translation_units::Column::ProjectId,
                        translation_units::Column::Key,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(conn)
                .await
                .map_err(ApiError::from)?;
        }
        Ok(inserted)
    }

    /// One `pending` version per (unit, language); existing pairs are left alone
    pub async fn insert_pending_versions<C>(
        conn: &C,
        unit_ids: &[String],
        language_ids: &[String],
        now: i64,
    ) -> Result<u64, ApiError>
    where
        C: ConnectionTrait,
    {
        let pairs: Vec<(&String, &String)> = unit_ids
            .iter()
            .flat_map(|unit_id| language_ids.iter().map(move |lang_id| (unit_id, lang_id)))
            .collect();

        let mut inserted = 0;
        for batch in pairs.chunks(INSERT_BATCH) {
            let models = batch
                .iter()
                .map(|(unit_id, lang_id)| translation_versions::ActiveModel {
                    id: Set(uuid::Uuid::new_v4().to_string()),
                    unit_id: Set((*unit_id).clone()),
                    project_language_id: Set((*lang_id).clone()),
                    translated_text: Set(None),
                    status: Set(TranslationStatus::Pending.as_str().to_string()),
                    created_at: Set(now),
                    updated_at: Set(now),
                });

            inserted += translation_versions::Entity::insert_many(models)
                .on_conflict(
                    OnConflict::columns([
                        translation_versions::Column::UnitId,
                        translation_versions::Column::ProjectLanguageId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(conn)
                .await
                .map_err(ApiError::from)?;
        }
        Ok(inserted)
    }

    /// Rewrite one unit's source text. Returns 1 when the stored text changed.
    pub async fn update_source_text<C>(
        conn: &C,
        project_id: &str,
        key: &str,
        source_text: &str,
        now: i64,
    ) -> Result<u64, ApiError>
    where
        C: ConnectionTrait,
    {
        let result = translation_units::Entity::update_many()
            .col_expr(translation_units::Column::SourceText, Expr::value(source_text))
            .col_expr(translation_units::Column::UpdatedAt, Expr::value(now))
            .filter(translation_units::Column::ProjectId.eq(project_id))
            .filter(translation_units::Column::Key.eq(key))
            .filter(translation_units::Column::SourceText.ne(source_text))
            .exec(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(result.rows_affected)
    }

    /// Every version of the given units, all languages, back to `pending`
    pub async fn reset_versions_to_pending<C>(
        conn: &C,
        unit_ids: &[String],
        now: i64,
    ) -> Result<u64, ApiError>
    where
        C: ConnectionTrait,
    {
        let mut affected = 0;
        for chunk in unit_ids.chunks(IN_CLAUSE_CHUNK) {
            let result = translation_versions::Entity::update_many()
                .col_expr(
                    translation_versions::Column::Status,
                    Expr::value(TranslationStatus::Pending.as_str()),
                )
                .col_expr(translation_versions::Column::UpdatedAt, Expr::value(now))
                .filter(translation_versions::Column::UnitId.is_in(chunk.iter().cloned()))
                .exec(conn)
                .await
                .map_err(ApiError::from)?;
            affected += result.rows_affected;
        }
        Ok(affected)
    }

    /// Versions holding a translation go to `needs_review`; pending ones are left as is
    pub async fn flag_translated_versions_for_review<C>(
        conn: &C,
        unit_ids: &[String],
        now: i64,
    ) -> Result<u64, ApiError>
    where
        C: ConnectionTrait,
    {
        let untouched = [
            TranslationStatus::Pending.as_str(),
            TranslationStatus::NeedsReview.as_str(),
        ];
        let mut affected = 0;
        for chunk in unit_ids.chunks(IN_CLAUSE_CHUNK) {
            let result = translation_versions::Entity::update_many()
                .col_expr(
                    translation_versions::Column::Status,
                    Expr::value(TranslationStatus::NeedsReview.as_str()),
                )
                .col_expr(translation_versions::Column::UpdatedAt, Expr::value(now))
                .filter(translation_versions::Column::UnitId.is_in(chunk.iter().cloned()))
                .filter(translation_versions::Column::Status.is_not_in(untouched))
                .exec(conn)
                .await
                .map_err(ApiError::from)?;
            affected += result.rows_affected;
        }
        Ok(affected)
    }

    /// Flip `is_obsolete` for the given keys; rows already in the target state are
    /// not counted
    pub async fn set_obsolete<C>(
        conn: &C,
        project_id: &str,
        keys: &[String],
        obsolete: bool,
        now: i64,
    ) -> Result<u64, ApiError>
    where
        C: ConnectionTrait,
    {
        let mut affected = 0;
        for chunk in keys.chunks(IN_CLAUSE_CHUNK) {
            let result = translation_units::Entity::update_many()
                .col_expr(translation_units::Column::IsObsolete, Expr::value(obsolete))
                .col_expr(translation_units::Column::UpdatedAt, Expr::value(now))
                .filter(translation_units::Column::ProjectId.eq(project_id))
                .filter(translation_units::Column::Key.is_in(chunk.iter().cloned()))
                .filter(translation_units::Column::IsObsolete.eq(!obsolete))
                .exec(conn)
                .await
                .map_err(ApiError::from)?;
            affected += result.rows_affected;
        }
        Ok(affected)
    }

    /// Load one unit (test only)
    #[cfg(test)]
    pub async fn get_unit<C>(
        conn: &C,
        project_id: &str,
        key: &str,
    ) -> Result<Option<translation_units::Model>, ApiError>
    where
        C: ConnectionTrait,
    {
        translation_units::Entity::find()
            .filter(translation_units::Column::ProjectId.eq(project_id))
            .filter(translation_units::Column::Key.eq(key))
            .one(conn)
            .await
            .map_err(ApiError::from)
    }

    /// Statuses of every version of one unit (test only)
    #[cfg(test)]
    pub async fn version_statuses<C>(
        conn: &C,
        unit_id: &str,
    ) -> Result<Vec<TranslationStatus>, ApiError>
    where
        C: ConnectionTrait,
    {
        let rows = translation_versions::Entity::find()
            .filter(translation_versions::Column::UnitId.eq(unit_id))
            .all(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(rows
            .iter()
            .map(|row| TranslationStatus::parse(&row.status))
            .collect())
    }

    /// Set the status of every version of one unit (test only)
    #[cfg(test)]
    pub async fn set_version_status<C>(
        conn: &C,
        unit_id: &str,
        status: TranslationStatus,
    ) -> Result<(), ApiError>
    where
        C: ConnectionTrait,
    {
        translation_versions::Entity::update_many()
            .col_expr(translation_versions::Column::Status, Expr::value(status.as_str()))
            .filter(translation_versions::Column::UnitId.eq(unit_id))
            .exec(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(())
    }
}
