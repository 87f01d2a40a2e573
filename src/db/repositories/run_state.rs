use crate::collect::continuation::ContinuationState;
use crate::domain::{ContentKind, SourceId};
use crate::entities::{collect_runs, prelude::*};
use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

/// Repository for persisted run continuation state
pub struct RunStateRepository {
    conn: DatabaseConnection,
}

impl RunStateRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_run_model(m: collect_runs::Model) -> Result<ContinuationState> {
        Ok(ContinuationState {
            source_id: SourceId::new(m.source_id),
            kind: m.kind.parse().map_err(anyhow::Error::msg)?,
            current_page: u32::try_from(m.current_page).unwrap_or(1),
            total_pages: u32::try_from(m.total_pages).unwrap_or(0),
            cancel_requested: m.cancel_requested,
        })
    }

    async fn find(
        &self,
        source: SourceId,
        kind: ContentKind,
    ) -> Result<Option<collect_runs::Model>> {
        let row = CollectRuns::find_by_id((source.value(), kind.as_str().to_string()))
            .one(&self.conn)
            .await?;
        Ok(row)
    }

    pub async fn load(
        &self,
        source: SourceId,
        kind: ContentKind,
    ) -> Result<Option<ContinuationState>> {
        self.find(source, kind)
            .await?
            .map(Self::map_run_model)
            .transpose()
    }

    pub async fn start(&self, source: SourceId, kind: ContentKind, page: u32) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let page = i32::try_from(page).unwrap_or(i32::MAX);

        if let Some(row) = self.find(source, kind).await? {
            let mut active: collect_runs::ActiveModel = row.into();
            active.current_page = Set(page);
            active.cancel_requested = Set(false);
            active.started_at = Set(now.clone());
            active.updated_at = Set(now);
            active.update(&self.conn).await?;
        } else {
            let active = collect_runs::ActiveModel {
                source_id: Set(source.value()),
                kind: Set(kind.as_str().to_string()),
                current_page: Set(page),
                total_pages: Set(0),
                cancel_requested: Set(false),
                started_at: Set(now.clone()),
                updated_at: Set(now),
            };
            CollectRuns::insert(active).exec(&self.conn).await?;
        }
        Ok(())
    }

    pub async fn advance(
        &self,
        source: SourceId,
        kind: ContentKind,
        page: u32,
        total_pages: u32,
    ) -> Result<()> {
        CollectRuns::update_many()
            .col_expr(
                collect_runs::Column::CurrentPage,
                sea_orm::sea_query::Expr::value(i32::try_from(page).unwrap_or(i32::MAX)),
            )
            .col_expr(
                collect_runs::Column::TotalPages,
                sea_orm::sea_query::Expr::value(i32::try_from(total_pages).unwrap_or(i32::MAX)),
            )
            .col_expr(
                collect_runs::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now().to_rfc3339()),
            )
            .filter(collect_runs::Column::SourceId.eq(source.value()))
            .filter(collect_runs::Column::Kind.eq(kind.as_str()))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn request_cancel(&self, source: SourceId, kind: ContentKind) -> Result<bool> {
        let result = CollectRuns::update_many()
            .col_expr(
                collect_runs::Column::CancelRequested,
                sea_orm::sea_query::Expr::value(true),
            )
            .filter(collect_runs::Column::SourceId.eq(source.value()))
            .filter(collect_runs::Column::Kind.eq(kind.as_str()))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn finish(&self, source: SourceId, kind: ContentKind) -> Result<()> {
        CollectRuns::delete_many()
            .filter(collect_runs::Column::SourceId.eq(source.value()))
            .filter(collect_runs::Column::Kind.eq(kind.as_str()))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<ContinuationState>> {
        let rows = CollectRuns::find()
            .order_by_asc(collect_runs::Column::SourceId)
            .order_by_asc(collect_runs::Column::Kind)
            .all(&self.conn)
            .await?;

        rows.into_iter().map(Self::map_run_model).collect()
    }
}
