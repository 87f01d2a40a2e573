use crate::collect::continuation::ContinuationState;
use crate::collect::dedup::DedupKey;
use crate::collect::error::{CollectError, CollectResult};
use crate::collect::record::{CanonicalRecord, FieldPatch, StoredRecord};
use crate::collect::source::CollectionSource;
use crate::collect::store::{CategoryDirectory, InsertOutcome, RecordStore, RunStateStore};
use crate::domain::{ContentKind, SourceId};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use crate::entities::categories::Model as Category;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn source_repo(&self) -> repositories::source::SourceRepository {
        repositories::source::SourceRepository::new(self.conn.clone())
    }

    fn binding_repo(&self) -> repositories::binding::BindingRepository {
        repositories::binding::BindingRepository::new(self.conn.clone())
    }

    fn category_repo(&self) -> repositories::category::CategoryRepository {
        repositories::category::CategoryRepository::new(self.conn.clone())
    }

    fn record_repo(&self) -> repositories::record::RecordRepository {
        repositories::record::RecordRepository::new(self.conn.clone())
    }

    fn run_repo(&self) -> repositories::run_state::RunStateRepository {
        repositories::run_state::RunStateRepository::new(self.conn.clone())
    }

    // Sources

    pub async fn add_source(&self, source: &CollectionSource) -> Result<SourceId> {
        self.source_repo().add(source).await
    }

    pub async fn update_source(&self, source: &CollectionSource) -> Result<bool> {
        self.source_repo().update(source).await
    }

    pub async fn get_source(&self, id: SourceId) -> Result<Option<CollectionSource>> {
        self.source_repo().get(id).await
    }

    pub async fn get_source_by_name(&self, name: &str) -> Result<Option<CollectionSource>> {
        self.source_repo().get_by_name(name).await
    }

    pub async fn list_sources(&self) -> Result<Vec<CollectionSource>> {
        self.source_repo().list().await
    }

    pub async fn remove_source(&self, id: SourceId) -> Result<bool> {
        self.source_repo().remove(id).await
    }

    // Categories and bindings

    pub async fn add_category(&self, name: &str, parent_id: i32) -> Result<i32> {
        self.category_repo().add(name, parent_id).await
    }

    pub async fn get_category(&self, id: i32) -> Result<Option<Category>> {
        self.category_repo().get(id).await
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.category_repo().list().await
    }

    pub async fn bind_category(&self, source: SourceId, remote: &str, local: i32) -> Result<()> {
        self.binding_repo().bind(source, remote, local).await
    }

    pub async fn unbind_category(&self, source: SourceId, remote: &str) -> Result<bool> {
        self.binding_repo().unbind(source, remote).await
    }

    pub async fn list_bindings(&self, source: SourceId) -> Result<Vec<(String, i32)>> {
        self.binding_repo().list_for_source(source).await
    }

    // Records

    pub async fn get_record(&self, id: i32) -> Result<Option<StoredRecord>> {
        self.record_repo().get(id).await
    }

    pub async fn set_record_locked(&self, id: i32, locked: bool) -> Result<bool> {
        self.record_repo().set_locked(id, locked).await
    }

    pub async fn count_records(&self, kind: ContentKind) -> Result<u64> {
        self.record_repo().count(kind).await
    }
}

#[async_trait::async_trait]
impl RecordStore for Store {
    async fn find_match(&self, key: &DedupKey) -> CollectResult<Option<StoredRecord>> {
        Ok(self.record_repo().find_match(key).await?)
    }

    async fn find_by_fingerprint(
        &self,
        kind: ContentKind,
        fingerprint: &str,
    ) -> CollectResult<Option<StoredRecord>> {
        Ok(self
            .record_repo()
            .find_by_dedup_key(kind, fingerprint)
            .await?)
    }

    async fn insert_record(
        &self,
        record: &CanonicalRecord,
        fingerprint: &str,
    ) -> CollectResult<InsertOutcome> {
        self.record_repo()
            .insert(record, fingerprint)
            .await
            .map_err(|e| CollectError::StoreWriteFailure(e.to_string()))
    }

    async fn update_record(&self, id: i32, patch: &FieldPatch) -> CollectResult<()> {
        self.record_repo()
            .update(id, patch)
            .await
            .map_err(|e| CollectError::StoreWriteFailure(e.to_string()))
    }
}

#[async_trait::async_trait]
impl CategoryDirectory for Store {
    async fn bindings(&self) -> CollectResult<HashMap<String, i32>> {
        Ok(self.binding_repo().all().await?)
    }

    async fn parents(&self) -> CollectResult<HashMap<i32, i32>> {
        Ok(self.category_repo().parents().await?)
    }
}

#[async_trait::async_trait]
impl RunStateStore for Store {
    async fn load_run(
        &self,
        source: SourceId,
        kind: ContentKind,
    ) -> CollectResult<Option<ContinuationState>> {
        Ok(self.run_repo().load(source, kind).await?)
    }

    async fn start_run(
        &self,
        source: SourceId,
        kind: ContentKind,
        page: u32,
    ) -> CollectResult<()> {
        Ok(self.run_repo().start(source, kind, page).await?)
    }

    async fn advance_run(
        &self,
        source: SourceId,
        kind: ContentKind,
        page: u32,
        total_pages: u32,
    ) -> CollectResult<()> {
        Ok(self.run_repo().advance(source, kind, page, total_pages).await?)
    }

    async fn request_cancel(&self, source: SourceId, kind: ContentKind) -> CollectResult<bool> {
        Ok(self.run_repo().request_cancel(source, kind).await?)
    }

    async fn finish_run(&self, source: SourceId, kind: ContentKind) -> CollectResult<()> {
        Ok(self.run_repo().finish(source, kind).await?)
    }

    async fn list_runs(&self) -> CollectResult<Vec<ContinuationState>> {
        Ok(self.run_repo().list().await?)
    }
}
