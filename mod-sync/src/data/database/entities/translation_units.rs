use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "translation_units")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub project_id: String,
    pub key: String,
    pub source_text: String,
    pub source_loc_file: Option<String>,
    pub is_obsolete: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Project,
    TranslationVersions,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Project => Entity::belongs_to(super::projects::Entity)
                .from(Column::ProjectId)
                .to(super::projects::Column::Id)
                .into(),
            Self::TranslationVersions => {
                Entity::has_many(super::translation_versions::Entity).into()
            }
        }
    }
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::translation_versions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TranslationVersions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
