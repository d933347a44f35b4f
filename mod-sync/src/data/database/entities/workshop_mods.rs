use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "workshop_mods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub workshop_id: String,
    pub app_id: String,
    pub title: String,
    pub subscriptions: Option<i64>,
    pub time_updated: i64,
    pub preview_url: Option<String>,
    pub last_checked_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        panic!("No relations")
    }
}

impl ActiveModelBehavior for ActiveModel {}
