//! The collection run: guard, fetch, decode, bind, normalize, resolve,
//! localize images, write, advance.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::clients::{FeedQuery, Fetcher, ensure_safe_target};
use crate::collect::continuation::{ContinuationDriver, RunPhase};
use crate::collect::decode::{self, DecodedPage};
use crate::collect::dedup::{BlendPolicy, DedupKey};
use crate::collect::error::{CollectError, CollectResult};
use crate::collect::image::ImageSynchronizer;
use crate::collect::merge::{MergeDecision, MergeEngine};
use crate::collect::normalize::Normalizer;
use crate::collect::pseudo::PseudoRewriter;
use crate::collect::record::{CanonicalRecord, FieldPatch, FieldValue, RemoteRecord};
use crate::collect::source::{CollectionSource, KindRules};
use crate::collect::store::{CategoryDirectory, InsertOutcome, RecordStore, RunStateStore};
use crate::collect::taxonomy::{Binder, CategoryTree};
use crate::config::CollectConfig;
use crate::domain::ContentKind;
use crate::domain::events::CollectEvent;

const IMAGE_FIELDS: &[&str] = &["pic", "logo"];

/// Parameters of one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub kind: ContentKind,
    /// Remote filters; the page is filled in by the run.
    pub query: FeedQuery,
    pub start_page: Option<u32>,
    pub resume: bool,
}

impl RunRequest {
    #[must_use]
    pub fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            query: FeedQuery::records(kind),
            start_page: None,
            resume: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Done,
    Cancelled,
    /// The page could not be fetched or decoded; the run row still points at
    /// it.
    Failed { page: u32, reason: String },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("done"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Failed { page, reason } => write!(f, "failed at page {page}: {reason}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub pages_completed: u32,
    pub total_pages: u32,
    /// Record count per outcome (`inserted`, `updated`, skip reason, `failed`).
    pub counts: BTreeMap<String, u32>,
    pub lines: Vec<String>,
}

impl RunSummary {
    #[must_use]
    pub fn count(&self, outcome: &str) -> u32 {
        self.counts.get(outcome).copied().unwrap_or(0)
    }
}

/// Collaborators of a run, passed explicitly instead of living in globals.
#[derive(Clone)]
pub struct CollectContext {
    pub records: Arc<dyn RecordStore>,
    pub directory: Arc<dyn CategoryDirectory>,
    pub runs: Arc<dyn RunStateStore>,
    pub fetcher: Arc<dyn Fetcher>,
    pub images: Arc<ImageSynchronizer>,
    pub pseudo: Arc<PseudoRewriter>,
    pub settings: CollectConfig,
    pub blend: BlendPolicy,
    pub events: broadcast::Sender<CollectEvent>,
    /// Fixed seed for the filler pass; entropy when unset.
    pub rng_seed: Option<u64>,
}

/// Per-run state shared by every record of the run.
struct RunScope<'a> {
    ctx: &'a CollectContext,
    source: &'a CollectionSource,
    kind: ContentKind,
    rules: KindRules,
    binder: Binder,
    tree: CategoryTree,
    rng: StdRng,
}

/// One record's fate, as reported on the outcome line.
enum RecordOutcome {
    Inserted,
    Updated(Vec<String>),
    Skipped(&'static str),
    Failed(String),
}

impl RecordOutcome {
    const fn key(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated(_) => "updated",
            Self::Skipped(reason) => *reason,
            Self::Failed(_) => "failed",
        }
    }
}

impl CollectContext {
    fn emit(&self, event: CollectEvent) {
        let _ = self.events.send(event);
    }

    /// Runs a collection of one kind from one source to completion,
    /// cancellation or the first page failure.
    ///
    /// Returns `Err` only when the run cannot start: an unsafe target, an
    /// invalid source url or a database failure while opening the run.
    pub async fn run(
        &self,
        source: &CollectionSource,
        request: RunRequest,
    ) -> CollectResult<RunSummary> {
        ensure_safe_target(&source.base_url, self.settings.resolve_target_hosts).await?;
        // A bad base url must fail before the run row exists.
        request.query.build_url(&source.base_url, &source.query_suffix)?;

        let kind = request.kind;
        let mut scope = RunScope {
            ctx: self,
            source,
            kind,
            rules: source.rules_for(kind),
            binder: Binder::load(self.directory.as_ref()).await?,
            tree: CategoryTree::load(self.directory.as_ref()).await?,
            rng: self
                .rng_seed
                .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64),
        };

        let driver = ContinuationDriver::new(
            self.runs.as_ref(),
            source.id,
            kind,
            request.query.is_selection(),
        );
        let mut page = driver.begin(request.start_page, request.resume).await?;

        info!(
            event = "collect.run_started",
            source = %source.id,
            kind = %kind,
            page,
            bindings = scope.binder.len(),
            "Collection run started"
        );
        self.emit(CollectEvent::RunStarted {
            source_id: source.id,
            kind,
            page,
        });

        let mut summary = RunSummary {
            outcome: RunOutcome::Done,
            pages_completed: 0,
            total_pages: 0,
            counts: BTreeMap::new(),
            lines: Vec::new(),
        };

        loop {
            if driver.cancel_requested().await? {
                driver.cancel().await?;
                summary.outcome = RunOutcome::Cancelled;
                info!(
                    event = "collect.cancelled",
                    source = %source.id,
                    kind = %kind,
                    page,
                    "Run cancelled"
                );
                break;
            }

            self.emit(CollectEvent::PageStarted {
                source_id: source.id,
                kind,
                page,
                total_pages: (summary.total_pages > 0).then_some(summary.total_pages),
            });

            let decoded = match self.fetch_page(source, &request.query, kind, page).await {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!(
                        event = "collect.page_failed",
                        source = %source.id,
                        kind = %kind,
                        page,
                        error = %e,
                        "Page failed, run stopped"
                    );
                    summary.outcome = RunOutcome::Failed {
                        page,
                        reason: e.to_string(),
                    };
                    break;
                }
            };
            summary.total_pages = decoded.meta.page_count;

            for remote in decoded.records {
                let label = record_label(&remote);
                let outcome = scope.process(remote).await;

                let line = match &outcome {
                    RecordOutcome::Inserted => format!("{label}: inserted"),
                    RecordOutcome::Updated(fields) => {
                        format!("{label}: updated ({})", fields.join(", "))
                    }
                    RecordOutcome::Skipped(reason) => format!("{label}: skipped ({reason})"),
                    RecordOutcome::Failed(reason) => format!("{label}: failed ({reason})"),
                };
                debug!(event = "collect.record", outcome = outcome.key(), "{line}");
                metrics::counter!("collect_records_total", "outcome" => outcome.key())
                    .increment(1);

                *summary.counts.entry(outcome.key().to_string()).or_default() += 1;
                self.emit(CollectEvent::RecordProcessed {
                    source_id: source.id,
                    kind,
                    page,
                    line: line.clone(),
                });
                summary.lines.push(line);
            }

            summary.pages_completed += 1;
            metrics::counter!("collect_pages_total").increment(1);
            self.emit(CollectEvent::PageFinished {
                source_id: source.id,
                kind,
                page,
                total_pages: summary.total_pages,
            });

            match driver.page_done(page, summary.total_pages).await? {
                RunPhase::Running(next) => page = next,
                RunPhase::Done | RunPhase::Cancelled => break,
            }

            if self.settings.page_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.settings.page_delay_ms)).await;
            }
        }

        info!(
            event = "collect.run_finished",
            source = %source.id,
            kind = %kind,
            pages = summary.pages_completed,
            total = summary.total_pages,
            outcome = %summary.outcome,
            "Collection run finished"
        );
        self.emit(CollectEvent::RunFinished {
            source_id: source.id,
            kind,
            pages_completed: summary.pages_completed,
            total_pages: summary.total_pages,
            state: summary.outcome.to_string(),
        });

        Ok(summary)
    }

    async fn fetch_page(
        &self,
        source: &CollectionSource,
        query: &FeedQuery,
        kind: ContentKind,
        page: u32,
    ) -> CollectResult<DecodedPage> {
        let url = query
            .clone()
            .with_page(page)
            .build_url(&source.base_url, &source.query_suffix)?;
        let raw = self.fetcher.fetch(&url).await?;
        decode::decode(&raw, source.format, kind)
    }

    /// Fetches the remote taxonomy (`ac=list`).
    pub async fn fetch_taxonomy(&self, source: &CollectionSource) -> CollectResult<DecodedPage> {
        ensure_safe_target(&source.base_url, self.settings.resolve_target_hosts).await?;
        let url = FeedQuery::taxonomy().build_url(&source.base_url, &source.query_suffix)?;
        let raw = self.fetcher.fetch(&url).await?;
        decode::decode(&raw, source.format, ContentKind::Video)
    }
}

fn record_label(remote: &RemoteRecord) -> String {
    format!("[{}] {}", remote.remote_id, remote.field("name").trim())
}

impl RunScope<'_> {
    async fn process(&mut self, remote: RemoteRecord) -> RecordOutcome {
        match self.try_process(remote).await {
            Ok(outcome) => outcome,
            Err(CollectError::RecordSkipped(reason)) => RecordOutcome::Skipped(reason.as_str()),
            Err(e) => RecordOutcome::Failed(e.to_string()),
        }
    }

    async fn try_process(&mut self, mut remote: RemoteRecord) -> CollectResult<RecordOutcome> {
        remote.kind = self.kind;
        let category = self.binder.bind(self.source.id, &remote.remote_category_id);

        let normalizer = Normalizer {
            source: self.source,
            tree: &self.tree,
            pseudo: self.ctx.pseudo.as_ref(),
        };
        let mut record = normalizer.normalize(remote, category, &mut self.rng)?;

        let engine = MergeEngine {
            rules: &self.rules,
            group_policy: self
                .source
                .group_merge_or(self.ctx.settings.group_merge_policy),
            blend: self.ctx.blend,
            store: self.ctx.records.as_ref(),
        };
        let key = engine.key(&record);
        self.reuse_local_images(&mut record.fields).await;

        match engine.resolve(&record, &key).await? {
            MergeDecision::Skip(reason) => Ok(RecordOutcome::Skipped(reason.as_str())),
            MergeDecision::Insert => {
                self.localize_images(&mut record.fields).await;
                self.insert_or_update(&engine, &record, &key).await
            }
            MergeDecision::Update { id, mut patch } => {
                self.localize_images(&mut patch.fields).await;
                self.apply_update(id, &patch).await
            }
        }
    }

    /// Inserts, or when another writer stored the same key first, merges
    /// into that record instead.
    async fn insert_or_update(
        &self,
        engine: &MergeEngine<'_>,
        record: &CanonicalRecord,
        key: &DedupKey,
    ) -> CollectResult<RecordOutcome> {
        let fingerprint = key.fingerprint();
        match self.ctx.records.insert_record(record, &fingerprint).await? {
            InsertOutcome::Inserted(id) => {
                debug!(event = "collect.inserted", id, kind = %self.kind, "Record inserted");
                Ok(RecordOutcome::Inserted)
            }
            InsertOutcome::Duplicate => {
                let existing = match self.ctx.records.find_match(key).await? {
                    Some(existing) => existing,
                    None => self
                        .ctx
                        .records
                        .find_by_fingerprint(self.kind, &fingerprint)
                        .await?
                        .ok_or_else(|| {
                            CollectError::StoreWriteFailure(
                                "duplicate dedup key but no matching record".to_string(),
                            )
                        })?,
                };
                match engine.decide_update(record, &existing, chrono::Utc::now()) {
                    MergeDecision::Update { id, patch } => self.apply_update(id, &patch).await,
                    MergeDecision::Skip(reason) => Ok(RecordOutcome::Skipped(reason.as_str())),
                    MergeDecision::Insert => Err(CollectError::StoreWriteFailure(
                        "insert retried as update resolved to insert".to_string(),
                    )),
                }
            }
        }
    }

    async fn apply_update(&self, id: i32, patch: &FieldPatch) -> CollectResult<RecordOutcome> {
        self.ctx.records.update_record(id, patch).await?;
        Ok(RecordOutcome::Updated(patch.changed()))
    }

    /// Points image fields at copies downloaded by earlier runs, without
    /// fetching anything. Must run before the record is compared against the
    /// stored one.
    async fn reuse_local_images(&self, fields: &mut BTreeMap<String, FieldValue>) {
        for field in IMAGE_FIELDS {
            let Some(value) = fields.get_mut(*field) else {
                continue;
            };
            if let Some(local) = self
                .ctx
                .images
                .existing(&value.as_text(), self.source.sync_images, self.kind)
                .await
            {
                *value = FieldValue::Text(local);
            }
        }
    }

    /// Downloads the images of a record about to be written.
    async fn localize_images(&self, fields: &mut BTreeMap<String, FieldValue>) {
        for field in IMAGE_FIELDS {
            let Some(value) = fields.get_mut(*field) else {
                continue;
            };
            let synced = self
                .ctx
                .images
                .sync(&value.as_text(), self.source.sync_images, self.kind)
                .await;
            *value = FieldValue::Text(synced.url);
        }
    }
}
