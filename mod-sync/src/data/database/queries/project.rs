use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set};

use super::now_epoch;
use crate::data::database::entities::{game_installations, project_languages, projects};
use crate::error::ApiError;
use crate::models::{GameInstallation, Project};

fn installation_from_model(model: game_installations::Model) -> GameInstallation {
    GameInstallation {
        id: model.id,
        game_code: model.game_code,
        game_name: model.game_name,
        installation_path: model.installation_path,
        workshop_path: model.steam_workshop_path,
        steam_app_id: model.steam_app_id,
    }
}

fn project_from_model(model: projects::Model) -> Project {
    Project {
        id: model.id,
        name: model.name,
        game_installation_id: model.game_installation_id,
        source_file_path: model.source_file_path,
        mod_steam_id: model.mod_steam_id,
        source_mod_updated: model.source_mod_updated,
    }
}

pub struct GameInstallationQueries;

impl GameInstallationQueries {
    pub async fn find_by_code<C>(
        conn: &C,
        game_code: &str,
    ) -> Result<Option<GameInstallation>, ApiError>
    where
        C: ConnectionTrait,
    {
        let row = game_installations::Entity::find()
            .filter(game_installations::Column::GameCode.eq(game_code))
            .one(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(row.map(installation_from_model))
    }

    pub async fn find_by_id<C>(conn: &C, id: &str) -> Result<Option<GameInstallation>, ApiError>
    where
        C: ConnectionTrait,
    {
        let row = game_installations::Entity::find_by_id(id.to_string())
            .one(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(row.map(installation_from_model))
    }

    /// Insert or update by game code
    pub async fn upsert<C>(conn: &C, installation: &GameInstallation) -> Result<(), ApiError>
    where
        C: ConnectionTrait,
    {
        let now = now_epoch();
        let active = game_installations::ActiveModel {
            id: Set(installation.id.clone()),
            game_code: Set(installation.game_code.clone()),
            game_name: Set(installation.game_name.clone()),
            installation_path: Set(installation.installation_path.clone()),
            steam_workshop_path: Set(installation.workshop_path.clone()),
            steam_app_id: Set(installation.steam_app_id.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        game_installations::Entity::insert(active)
            .on_conflict(
                OnConflict::column(game_installations::Column::GameCode)
                    .update_columns([
                        game_installations::Column::GameName,
                        game_installations::Column::InstallationPath,
                        game_installations::Column::SteamWorkshopPath,
                        game_installations::Column::SteamAppId,
                        game_installations::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(())
    }
}

pub struct ProjectQueries;

impl ProjectQueries {
    pub async fn find_by_id<C>(conn: &C, project_id: &str) -> Result<Option<Project>, ApiError>
    where
        C: ConnectionTrait,
    {
        let row = projects::Entity::find_by_id(project_id.to_string())
            .one(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(row.map(project_from_model))
    }

    /// Projects of one game that were imported from a Workshop mod, oldest first
    pub async fn find_imported_by_game<C>(
        conn: &C,
        game_installation_id: &str,
    ) -> Result<Vec<Project>, ApiError>
    where
        C: ConnectionTrait,
    {
        use sea_orm::QueryOrder;

        let rows = projects::Entity::find()
            .filter(projects::Column::GameInstallationId.eq(game_installation_id))
            .filter(projects::Column::ModSteamId.is_not_null())
            .order_by_asc(projects::Column::CreatedAt)
            .order_by_asc(projects::Column::Id)
            .all(conn)
            .await
            .map_err(ApiError::from)?;

        Ok(rows.into_iter().map(project_from_model).collect())
    }

    pub async fn insert<C>(conn: &C, project: &Project) -> Result<(), ApiError>
    where
        C: ConnectionTrait,
    {
        let now = now_epoch();
        let active = projects::ActiveModel {
            id: Set(project.id.clone()),
            name: Set(project.name.clone()),
            game_installation_id: Set(project.game_installation_id.clone()),
            source_file_path: Set(project.source_file_path.clone()),
            mod_steam_id: Set(project.mod_steam_id.clone()),
            source_mod_updated: Set(project.source_mod_updated),
            created_at: Set(now),
            updated_at: Set(now),
        };
        projects::Entity::insert(active)
            .exec_without_returning(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(())
    }

    /// Advance (or set) the remote-update watermark of a project
    pub async fn set_source_mod_updated<C>(
        conn: &C,
        project_id: &str,
        time_updated: i64,
    ) -> Result<bool, ApiError>
    where
        C: ConnectionTrait,
    {
        let result = projects::Entity::update_many()
            .col_expr(projects::Column::SourceModUpdated, Expr::value(time_updated))
            .col_expr(projects::Column::UpdatedAt, Expr::value(now_epoch()))
            .filter(projects::Column::Id.eq(project_id))
            .exec(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(result.rows_affected > 0)
    }

    /// Ids of every language row of a project
    pub async fn language_ids<C>(conn: &C, project_id: &str) -> Result<Vec<String>, ApiError>
    where
        C: ConnectionTrait,
    {
        project_languages::Entity::find()
            .select_only()
            .column(project_languages::Column::Id)
            .filter(project_languages::Column::ProjectId.eq(project_id))
            .into_tuple::<String>()
            .all(conn)
            .await
            .map_err(ApiError::from)
    }

    /// Returns the language row id
    pub async fn add_language<C>(
        conn: &C,
        project_id: &str,
        language_code: &str,
    ) -> Result<String, ApiError>
    where
        C: ConnectionTrait,
    {
        let id = uuid::Uuid::new_v4().to_string();
        let active = project_languages::ActiveModel {
            id: Set(id.clone()),
            project_id: Set(project_id.to_string()),
            language_code: Set(language_code.to_string()),
            created_at: Set(now_epoch()),
        };
        project_languages::Entity::insert(active)
            .exec_without_returning(conn)
            .await
            .map_err(ApiError::from)?;
        Ok(id)
    }
}
