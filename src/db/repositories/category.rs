use crate::entities::{categories, prelude::*};
use anyhow::Result;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, Set};
use std::collections::HashMap;

/// Repository for the local category tree
pub struct CategoryRepository {
    conn: DatabaseConnection,
}

impl CategoryRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn add(&self, name: &str, parent_id: i32) -> Result<i32> {
        let active = categories::ActiveModel {
            name: Set(name.to_string()),
            parent_id: Set(parent_id.max(0)),
            ..Default::default()
        };

        let res = Categories::insert(active).exec(&self.conn).await?;
        Ok(res.last_insert_id)
    }

    pub async fn get(&self, id: i32) -> Result<Option<categories::Model>> {
        Ok(Categories::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn list(&self) -> Result<Vec<categories::Model>> {
        Ok(Categories::find()
            .order_by_asc(categories::Column::ParentId)
            .order_by_asc(categories::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn parents(&self) -> Result<HashMap<i32, i32>> {
        let rows = Categories::find().all(&self.conn).await?;
        Ok(rows.into_iter().map(|r| (r.id, r.parent_id)).collect())
    }
}
