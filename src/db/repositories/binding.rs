use crate::collect::taxonomy::binding_key;
use crate::domain::SourceId;
use crate::entities::{category_bindings, prelude::*};
use anyhow::Result;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashMap;

/// Repository for remote-to-local category bindings
pub struct BindingRepository {
    conn: DatabaseConnection,
}

impl BindingRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Binds a remote category to a local one, replacing any earlier binding
    /// of the same remote category.
    pub async fn bind(&self, source: SourceId, remote: &str, local: i32) -> Result<()> {
        let key = binding_key(source, remote.trim());

        let existing = CategoryBindings::find()
            .filter(category_bindings::Column::BindingKey.eq(&key))
            .one(&self.conn)
            .await?;

        if let Some(row) = existing {
            let mut active: category_bindings::ActiveModel = row.into();
            active.local_category_id = Set(local);
            active.update(&self.conn).await?;
        } else {
            let active = category_bindings::ActiveModel {
                binding_key: Set(key),
                source_id: Set(source.value()),
                remote_category_id: Set(remote.trim().to_string()),
                local_category_id: Set(local),
                ..Default::default()
            };
            CategoryBindings::insert(active).exec(&self.conn).await?;
        }
        Ok(())
    }

    pub async fn unbind(&self, source: SourceId, remote: &str) -> Result<bool> {
        let result = CategoryBindings::delete_many()
            .filter(category_bindings::Column::BindingKey.eq(binding_key(source, remote.trim())))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// `(remote category, local category)` pairs of one source.
    pub async fn list_for_source(&self, source: SourceId) -> Result<Vec<(String, i32)>> {
        let rows = CategoryBindings::find()
            .filter(category_bindings::Column::SourceId.eq(source.value()))
            .order_by_asc(category_bindings::Column::RemoteCategoryId)
            .all(&self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.remote_category_id, r.local_category_id))
            .collect())
    }

    pub async fn all(&self) -> Result<HashMap<String, i32>> {
        let rows = CategoryBindings::find().all(&self.conn).await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.binding_key, r.local_category_id))
            .collect())
    }
}
