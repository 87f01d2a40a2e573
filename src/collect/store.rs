//! Storage seams of the pipeline.
//!
//! The pipeline only talks to these traits; `db::Store` implements them over
//! SQLite.

use std::collections::HashMap;

use crate::collect::continuation::ContinuationState;
use crate::collect::dedup::DedupKey;
use crate::collect::error::CollectResult;
use crate::collect::record::{CanonicalRecord, FieldPatch, StoredRecord};
use crate::domain::{ContentKind, SourceId};

/// Result of an insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i32),
    /// Another writer already stored a record with the same dedup key.
    Duplicate,
}

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// First stored record of the key's kind matching the key.
    async fn find_match(&self, key: &DedupKey) -> CollectResult<Option<StoredRecord>>;

    /// The record stored under `fingerprint`, whatever its columns say now.
    async fn find_by_fingerprint(
        &self,
        kind: ContentKind,
        fingerprint: &str,
    ) -> CollectResult<Option<StoredRecord>>;

    async fn insert_record(
        &self,
        record: &CanonicalRecord,
        fingerprint: &str,
    ) -> CollectResult<InsertOutcome>;

    async fn update_record(&self, id: i32, patch: &FieldPatch) -> CollectResult<()>;
}

#[async_trait::async_trait]
pub trait CategoryDirectory: Send + Sync {
    /// Every binding, keyed `"<sourceId>_<remoteCategoryId>"`.
    async fn bindings(&self) -> CollectResult<HashMap<String, i32>>;

    /// Local category id to parent id.
    async fn parents(&self) -> CollectResult<HashMap<i32, i32>>;
}

#[async_trait::async_trait]
pub trait RunStateStore: Send + Sync {
    async fn load_run(
        &self,
        source: SourceId,
        kind: ContentKind,
    ) -> CollectResult<Option<ContinuationState>>;

    /// Creates or resets the run row at `page` with the cancel flag cleared.
    async fn start_run(&self, source: SourceId, kind: ContentKind, page: u32)
    -> CollectResult<()>;

    /// Moves the run to `page`, leaving the cancel flag as it is.
    async fn advance_run(
        &self,
        source: SourceId,
        kind: ContentKind,
        page: u32,
        total_pages: u32,
    ) -> CollectResult<()>;

    /// Sets the cancel flag. Returns false when no run is in progress.
    async fn request_cancel(&self, source: SourceId, kind: ContentKind) -> CollectResult<bool>;

    async fn finish_run(&self, source: SourceId, kind: ContentKind) -> CollectResult<()>;

    async fn list_runs(&self) -> CollectResult<Vec<ContinuationState>>;
}
