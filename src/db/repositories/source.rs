use crate::collect::source::{CollectionSource, KindRules};
use crate::domain::{ContentKind, SourceId};
use crate::entities::{collect_sources, prelude::*};
use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::BTreeMap;
use tracing::info;

/// Repository for operator-configured collection sources
pub struct SourceRepository {
    conn: DatabaseConnection,
}

impl SourceRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    // ========================================================================
    // Model Conversion Helpers
    // ========================================================================

    fn map_source_model(m: collect_sources::Model) -> Result<CollectionSource> {
        let rules: BTreeMap<ContentKind, KindRules> = serde_json::from_str(&m.rules_json)
            .with_context(|| format!("Corrupt rules on source {}", m.id))?;

        Ok(CollectionSource {
            id: SourceId::new(m.id),
            name: m.name,
            base_url: m.base_url,
            format: m.format.parse().map_err(anyhow::Error::msg)?,
            query_suffix: m.query_suffix,
            rules,
            sync_images: m.sync_images,
            name_filter: decode_list(&m.name_filter)?,
            year_filter: decode_list(&m.year_filter)?,
            play_sources: decode_list(&m.play_sources)?,
            down_sources: decode_list(&m.down_sources)?,
            group_merge: m
                .group_merge
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(anyhow::Error::msg)?,
        })
    }

    fn fill_active(
        active: &mut collect_sources::ActiveModel,
        source: &CollectionSource,
    ) -> Result<()> {
        active.name = Set(source.name.clone());
        active.base_url = Set(source.base_url.clone());
        active.format = Set(source.format.as_str().to_string());
        active.query_suffix = Set(source.query_suffix.clone());
        active.rules_json = Set(serde_json::to_string(&source.rules)?);
        active.sync_images = Set(source.sync_images);
        active.name_filter = Set(serde_json::to_string(&source.name_filter)?);
        active.year_filter = Set(serde_json::to_string(&source.year_filter)?);
        active.play_sources = Set(serde_json::to_string(&source.play_sources)?);
        active.down_sources = Set(serde_json::to_string(&source.down_sources)?);
        active.group_merge = Set(source.group_merge.map(|p| p.as_str().to_string()));
        Ok(())
    }

    // ========================================================================
    // Source Operations
    // ========================================================================

    pub async fn add(&self, source: &CollectionSource) -> Result<SourceId> {
        let mut active = collect_sources::ActiveModel {
            created_at: Set(Utc::now().to_rfc3339()),
            ..Default::default()
        };
        Self::fill_active(&mut active, source)?;

        let res = CollectSources::insert(active).exec(&self.conn).await?;
        info!("Added collection source {}: {}", res.last_insert_id, source.base_url);
        Ok(SourceId::new(res.last_insert_id))
    }

    pub async fn update(&self, source: &CollectionSource) -> Result<bool> {
        let Some(row) = CollectSources::find_by_id(source.id.value())
            .one(&self.conn)
            .await?
        else {
            return Ok(false);
        };

        let mut active: collect_sources::ActiveModel = row.into();
        Self::fill_active(&mut active, source)?;
        active.update(&self.conn).await?;
        Ok(true)
    }

    pub async fn get(&self, id: SourceId) -> Result<Option<CollectionSource>> {
        let row = CollectSources::find_by_id(id.value()).one(&self.conn).await?;
        row.map(Self::map_source_model).transpose()
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<CollectionSource>> {
        let row = CollectSources::find()
            .filter(collect_sources::Column::Name.eq(name))
            .one(&self.conn)
            .await?;
        row.map(Self::map_source_model).transpose()
    }

    pub async fn list(&self) -> Result<Vec<CollectionSource>> {
        let rows = CollectSources::find()
            .order_by_asc(collect_sources::Column::Id)
            .all(&self.conn)
            .await?;

        rows.into_iter().map(Self::map_source_model).collect()
    }

    pub async fn remove(&self, id: SourceId) -> Result<bool> {
        let result = CollectSources::delete_by_id(id.value())
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

fn decode_list(raw: &str) -> Result<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(raw)?)
}
