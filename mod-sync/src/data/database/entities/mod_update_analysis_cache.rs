use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "mod_update_analysis_cache")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub project_id: String,
    pub pack_file_path: String,
    pub file_last_modified: i64,
    pub new_units_count: i64,
    pub removed_units_count: i64,
    pub modified_units_count: i64,
    pub reactivated_units_count: i64,
    pub total_pack_units: i64,
    pub total_project_units: i64,
    pub analyzed_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Project,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Project => Entity::belongs_to(super::projects::Entity)
                .from(Column::ProjectId)
                .to(super::projects::Column::Id)
                .into(),
        }
    }
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
