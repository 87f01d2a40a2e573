use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "collect_sources")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub base_url: String,
    pub format: String,
    pub query_suffix: String,
    /// Per-kind rules, JSON keyed by kind.
    #[sea_orm(column_type = "Text")]
    pub rules_json: String,
    pub sync_images: bool,
    #[sea_orm(column_type = "Text")]
    pub name_filter: String,
    #[sea_orm(column_type = "Text")]
    pub year_filter: String,
    #[sea_orm(column_type = "Text")]
    pub play_sources: String,
    #[sea_orm(column_type = "Text")]
    pub down_sources: String,
    pub group_merge: Option<String>,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
