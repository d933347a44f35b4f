use std::collections::HashMap;

use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use super::{INSERT_BATCH, IN_CLAUSE_CHUNK};
use crate::data::database::entities::workshop_mods;
use crate::error::ApiError;
use crate::models::RemoteModRecord;

fn record_from_model(model: workshop_mods::Model) -> RemoteModRecord {
    RemoteModRecord {
        workshop_id: model.workshop_id,
        app_id: model.app_id,
        title: model.title,
        subscriptions: model.subscriptions,
        time_updated: model.time_updated,
        preview_url: model.preview_url,
        last_checked_at: model.last_checked_at,
    }
}

/// Persisted remote Workshop metadata
pub struct WorkshopModQueries;

impl WorkshopModQueries {
    pub async fn get<C>(conn: &C, workshop_id: &str) -> Result<Option<RemoteModRecord>, ApiError>
    where
        C: ConnectionTrait,
    {
        let row = workshop_mods::Entity::find_by_id(workshop_id.to_string())
            .one(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(row.map(record_from_model))
    }

    pub async fn get_many<C>(
        conn: &C,
        workshop_ids: &[String],
    ) -> Result<HashMap<String, RemoteModRecord>, ApiError>
    where
        C: ConnectionTrait,
    {
        let mut result = HashMap::with_capacity(workshop_ids.len());
        for chunk in workshop_ids.chunks(IN_CLAUSE_CHUNK) {
            let rows = workshop_mods::Entity::find()
                .filter(workshop_mods::Column::WorkshopId.is_in(chunk.iter().cloned()))
                .all(conn)
                .await
                .map_err(ApiError::from)?;
            for row in rows {
                result.insert(row.workshop_id.clone(), record_from_model(row));
            }
        }
        Ok(result)
    }

    /// Overwrites every column of existing rows
    pub async fn upsert_many<C>(conn: &C, records: &[RemoteModRecord]) -> Result<(), ApiError>
    where
        C: ConnectionTrait,
    {
        let mut unique: HashMap<&str, &RemoteModRecord> = HashMap::new();
        for record in records {
            unique.insert(record.workshop_id.as_str(), record);
        }
        let records: Vec<&RemoteModRecord> = unique.into_values().collect();

        for batch in records.chunks(INSERT_BATCH) {
            let models = batch.iter().map(|record| workshop_mods::ActiveModel {
                workshop_id: Set(record.workshop_id.clone()),
                app_id: Set(record.app_id.clone()),
                title: Set(record.title.clone()),
                subscriptions: Set(record.subscriptions),
                time_updated: Set(record.time_updated),
                preview_url: Set(record.preview_url.clone()),
                last_checked_at: Set(record.last_checked_at),
            });

            workshop_mods::Entity::insert_many(models)
                .on_conflict(
                    OnConflict::column(workshop_mods::Column::WorkshopId)
                        .update_columns([
                            workshop_mods::Column::AppId,
                            workshop_mods::Column::Title,
                            workshop_mods::Column::Subscriptions,
                            workshop_mods::Column::TimeUpdated,
                            workshop_mods::Column::PreviewUrl,
                            workshop_mods::Column::LastCheckedAt,
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
