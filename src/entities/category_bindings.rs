use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "category_bindings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// `"<sourceId>_<remoteCategoryId>"`.
    #[sea_orm(unique)]
    pub binding_key: String,
    pub source_id: i32,
    pub remote_category_id: String,
    pub local_category_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
