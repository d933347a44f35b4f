use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "translation_versions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub unit_id: String,
    pub project_language_id: String,
    pub translated_text: Option<String>,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    TranslationUnit,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::TranslationUnit => Entity::belongs_to(super::translation_units::Entity)
                .from(Column::UnitId)
                .to(super::translation_units::Column::Id)
                .into(),
        }
    }
}

impl Related<super::translation_units::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TranslationUnit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
