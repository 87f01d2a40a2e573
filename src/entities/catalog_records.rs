use sea_orm::entity::prelude::*;

/// One local catalog row of any content kind.
///
/// The columns a dedup rule can select are stored flat so lookups stay
/// indexable; every other field lives in `fields_json`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "catalog_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub kind: String,
    pub dedup_key: String,
    pub remote_id: String,
    pub name: String,
    pub category_id: i32,
    pub parent_category_id: i32,
    pub year: String,
    pub region: String,
    pub language: String,
    pub actor: String,
    pub director: String,
    pub author: String,
    pub external_id: String,
    pub locked: bool,
    #[sea_orm(column_type = "Text")]
    pub fields_json: String,
    pub play_from: String,
    pub play_server: String,
    pub play_note: String,
    #[sea_orm(column_type = "Text")]
    pub play_url: String,
    pub down_from: String,
    pub down_server: String,
    pub down_note: String,
    #[sea_orm(column_type = "Text")]
    pub down_url: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
