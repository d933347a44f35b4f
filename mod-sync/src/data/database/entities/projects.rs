use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub game_installation_id: String,
    pub source_file_path: Option<String>,
    pub mod_steam_id: Option<String>,
    /// Remote update time the project was last reconciled against
    pub source_mod_updated: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    GameInstallation,
    ProjectLanguages,
    TranslationUnits,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::GameInstallation => Entity::belongs_to(super::game_installations::Entity)
                .from(Column::GameInstallationId)
                .to(super::game_installations::Column::Id)
                .into(),
            Self::ProjectLanguages => Entity::has_many(super::project_languages::Entity).into(),
            Self::TranslationUnits => Entity::has_many(super::translation_units::Entity).into(),
        }
    }
}

impl Related<super::game_installations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GameInstallation.def()
    }
}

impl Related<super::project_languages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectLanguages.def()
    }
}

impl Related<super::translation_units::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TranslationUnits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
