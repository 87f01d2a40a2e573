//! End-to-end collection runs against a temporary database and an in-process
//! fake remote.

use catalog_collect::clients::Fetcher;
use catalog_collect::collect::{
    BlendPolicy, CanonicalRecord, CollectContext, CollectError, CollectResult, CollectionSource,
    DedupKey, FieldPatch, ImageSynchronizer, InsertOutcome, KindRules, PseudoRewriter, RecordStore,
    RunOutcome, RunRequest, RunStateStore, StoredRecord,
};
use catalog_collect::config::CollectConfig;
use catalog_collect::db::Store;
use catalog_collect::domain::{ContentKind, SourceId, SourceMode, WireFormat};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const REMOTE_CATEGORY: &str = "5";
const IMAGE_HOST: &str = "https://img.example.com/";

#[derive(Default)]
struct FakeRemote {
    pages: Mutex<HashMap<u32, Vec<u8>>>,
    failing: Mutex<HashSet<u32>>,
    fetched: Mutex<Vec<String>>,
    /// Requests a cancel while serving this page.
    cancel_on: Mutex<Option<(Store, SourceId, u32)>>,
}

impl FakeRemote {
    fn serve(&self, page: u32, body: Vec<u8>) {
        self.pages.lock().unwrap().insert(page, body);
    }

    fn fail(&self, page: u32, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(page);
        } else {
            set.remove(&page);
        }
    }

    fn fetched_pages(&self) -> Vec<u32> {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .filter(|u| !u.starts_with(IMAGE_HOST))
            .map(|u| page_of(u))
            .collect()
    }

    fn fetched_images(&self) -> Vec<String> {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.starts_with(IMAGE_HOST))
            .cloned()
            .collect()
    }
}

fn page_of(url: &str) -> u32 {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "pg")
                .and_then(|(_, v)| v.parse().ok())
        })
        .unwrap_or(1)
}

#[async_trait::async_trait]
impl Fetcher for FakeRemote {
    async fn fetch(&self, url: &str) -> CollectResult<Vec<u8>> {
        self.fetched.lock().unwrap().push(url.to_string());
        let page = page_of(url);

        if self.failing.lock().unwrap().contains(&page) {
            return Err(CollectError::NetworkFailure {
                url: url.to_string(),
                reason: "HTTP 503 Service Unavailable".to_string(),
            });
        }

        let hook = self.cancel_on.lock().unwrap().clone();
        if let Some((store, source, at)) = hook
            && at == page
        {
            store.request_cancel(source, ContentKind::Video).await?;
        }

        self.pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .ok_or_else(|| CollectError::NetworkFailure {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }
}

struct Harness {
    store: Store,
    remote: Arc<FakeRemote>,
    ctx: CollectContext,
    source: CollectionSource,
    local_category: i32,
}

async fn harness(base_url: &str, rules: KindRules) -> Harness {
    let db_path =
        std::env::temp_dir().join(format!("catalog-collect-test-{}.db", uuid::Uuid::new_v4()));
    let store = Store::with_pool_options(&format!("sqlite:{}", db_path.display()), 2, 1)
        .await
        .expect("failed to open store");

    let mut source = CollectionSource::new(SourceId::default(), "fake", base_url)
        .with_rules(ContentKind::Video, rules);
    source.format = WireFormat::Json;
    source.id = store.add_source(&source).await.unwrap();

    let parent = store.add_category("Anime", 0).await.unwrap();
    let local_category = store.add_category("TV Anime", parent).await.unwrap();
    store
        .bind_category(source.id, REMOTE_CATEGORY, local_category)
        .await
        .unwrap();

    let remote = Arc::new(FakeRemote::default());
    let settings = CollectConfig {
        resolve_target_hosts: false,
        ..CollectConfig::default()
    };
    let images_root = std::env::temp_dir().join(format!("catalog-images-{}", uuid::Uuid::new_v4()));
    let (events, _) = broadcast::channel(64);
    let shared = Arc::new(store.clone());

    let ctx = CollectContext {
        records: shared.clone(),
        directory: shared.clone(),
        runs: shared,
        fetcher: remote.clone(),
        images: Arc::new(ImageSynchronizer::new(
            remote.clone(),
            images_root,
            "/upload",
            false,
        )),
        pseudo: Arc::new(PseudoRewriter::disabled()),
        settings,
        blend: BlendPolicy::default(),
        events,
        rng_seed: Some(7),
    };

    Harness {
        store,
        remote,
        ctx,
        source,
        local_category,
    }
}

fn rules(mode: SourceMode, dedup: &str, merge: &str) -> KindRules {
    KindRules {
        mode,
        dedup: dedup.to_string(),
        merge: merge.to_string(),
    }
}

fn video(id: u32, name: &str, category: &str, episodes: &str, serial: &str) -> Value {
    json!({
        "vod_id": id,
        "vod_name": name,
        "type_id": category,
        "vod_year": "2023",
        "vod_area": "Japan",
        "vod_serial": serial,
        "vod_play_from": "m3u8",
        "vod_play_server": "no",
        "vod_play_note": "",
        "vod_play_url": episodes,
    })
}

fn page(page: u32, pagecount: u32, list: &[Value]) -> Vec<u8> {
    json!({
        "code": 1,
        "msg": "list",
        "page": page,
        "pagecount": pagecount,
        "limit": "20",
        "total": list.len(),
        "list": list,
    })
    .to_string()
    .into_bytes()
}

fn episode_urls(store_record: &catalog_collect::collect::StoredRecord) -> Vec<String> {
    store_record.play[0]
        .episodes
        .iter()
        .map(|e| e.url.clone())
        .collect()
}

const BASE: &str = "https://api.example.com/api.php/provide/vod/";

#[tokio::test]
async fn test_rerun_of_unchanged_page_changes_nothing() {
    let h = harness(BASE, rules(SourceMode::Both, "a", "ac")).await;
    h.remote.serve(
        1,
        page(
            1,
            1,
            &[
                video(1, "Frieren", REMOTE_CATEGORY, "EP1$https://cdn.example.com/f1.m3u8", "1"),
                video(2, "Dandadan", REMOTE_CATEGORY, "EP1$https://cdn.example.com/d1.m3u8", "1"),
            ],
        ),
    );

    let first = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(first.outcome, RunOutcome::Done);
    assert_eq!(first.count("inserted"), 2);

    let second = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(second.count("inserted"), 0);
    assert_eq!(second.count("updated"), 0);
    assert_eq!(second.count("noChangedFields"), 2);
    assert_eq!(h.store.count_records(ContentKind::Video).await.unwrap(), 2);

    let stored = h.store.get_record(1).await.unwrap().unwrap();
    assert_eq!(stored.category_id, h.local_category);
}

#[tokio::test]
async fn test_union_merge_appends_new_episodes() {
    let h = harness(BASE, rules(SourceMode::Both, "a", "a")).await;
    h.remote.serve(
        1,
        page(
            1,
            1,
            &[video(
                1,
                "Frieren",
                REMOTE_CATEGORY,
                "EP1$https://cdn.example.com/1.m3u8#EP2$https://cdn.example.com/2.m3u8",
                "",
            )],
        ),
    );
    h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();

    h.remote.serve(
        1,
        page(
            1,
            1,
            &[video(
                1,
                "Frieren",
                REMOTE_CATEGORY,
                "EP3$https://cdn.example.com/3.m3u8#EP2$https://cdn.example.com/2.m3u8",
                "",
            )],
        ),
    );
    let summary = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(summary.count("updated"), 1);
    assert!(summary.lines[0].ends_with("updated (play)"), "{}", summary.lines[0]);

    let stored = h.store.get_record(1).await.unwrap().unwrap();
    assert_eq!(
        episode_urls(&stored),
        vec![
            "https://cdn.example.com/1.m3u8",
            "https://cdn.example.com/2.m3u8",
            "https://cdn.example.com/3.m3u8",
        ]
    );
}

#[tokio::test]
async fn test_serial_does_not_move_backwards() {
    let h = harness(BASE, rules(SourceMode::Both, "a", "c")).await;
    let eps = "EP1$https://cdn.example.com/1.m3u8";

    h.remote
        .serve(1, page(1, 1, &[video(1, "Frieren", REMOTE_CATEGORY, eps, "12")]));
    h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();

    h.remote
        .serve(1, page(1, 1, &[video(1, "Frieren", REMOTE_CATEGORY, eps, "10")]));
    let stale = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(stale.count("noChangedFields"), 1);
    let stored = h.store.get_record(1).await.unwrap().unwrap();
    assert_eq!(stored.text("serial"), "12");

    h.remote
        .serve(1, page(1, 1, &[video(1, "Frieren", REMOTE_CATEGORY, eps, "13")]));
    let fresh = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(fresh.count("updated"), 1);
    let stored = h.store.get_record(1).await.unwrap().unwrap();
    assert_eq!(stored.text("serial"), "13");
}

#[tokio::test]
async fn test_unbound_category_is_skipped() {
    let h = harness(BASE, rules(SourceMode::Both, "a", "a")).await;
    h.remote.serve(
        1,
        page(
            1,
            1,
            &[
                video(1, "Frieren", "99", "EP1$https://cdn.example.com/1.m3u8", ""),
                video(2, "Dandadan", REMOTE_CATEGORY, "EP1$https://cdn.example.com/d.m3u8", ""),
            ],
        ),
    );

    let summary = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(summary.count("categoryUnbound"), 1);
    assert_eq!(summary.count("inserted"), 1);
    assert!(summary.lines[0].contains("skipped (categoryUnbound)"));
    assert_eq!(h.store.count_records(ContentKind::Video).await.unwrap(), 1);
}

#[tokio::test]
async fn test_update_only_source_never_inserts() {
    let h = harness(BASE, rules(SourceMode::UpdateOnly, "a", "a")).await;
    h.remote.serve(
        1,
        page(1, 1, &[video(1, "Frieren", REMOTE_CATEGORY, "EP1$u1", "")]),
    );

    let summary = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(summary.count("notConfiguredToInsert"), 1);
    assert_eq!(h.store.count_records(ContentKind::Video).await.unwrap(), 0);
}

#[tokio::test]
async fn test_pagination_stops_at_page_count() {
    let h = harness(BASE, rules(SourceMode::Both, "a", "")).await;
    for n in 1..=3 {
        h.remote.serve(
            n,
            page(
                n,
                3,
                &[video(n, &format!("Show {n}"), REMOTE_CATEGORY, "EP1$u", "")],
            ),
        );
    }
    h.remote.serve(4, page(4, 3, &[]));

    let summary = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(summary.outcome, RunOutcome::Done);
    assert_eq!(summary.pages_completed, 3);
    assert_eq!(h.remote.fetched_pages(), vec![1, 2, 3]);
    assert!(h.store.list_runs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_after_page_two_stops_before_page_three() {
    let h = harness(BASE, rules(SourceMode::Both, "a", "")).await;
    for n in 1..=5 {
        h.remote.serve(
            n,
            page(
                n,
                5,
                &[video(n, &format!("Show {n}"), REMOTE_CATEGORY, "EP1$u", "")],
            ),
        );
    }
    *h.remote.cancel_on.lock().unwrap() = Some((h.store.clone(), h.source.id, 2));

    let summary = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert_eq!(summary.pages_completed, 2);
    assert_eq!(h.remote.fetched_pages(), vec![1, 2]);
    assert!(
        h.store
            .load_run(h.source.id, ContentKind::Video)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_loopback_source_is_refused_without_fetching() {
    let h = harness(
        "http://127.0.0.1:8080/api.php/provide/vod/",
        rules(SourceMode::Both, "a", ""),
    )
    .await;

    let err = h
        .ctx
        .run(&h.source, RunRequest::new(ContentKind::Video))
        .await
        .unwrap_err();
    assert!(matches!(err, CollectError::UnsafeTarget(_)), "{err}");
    assert!(h.remote.fetched_pages().is_empty());
    assert!(h.store.list_runs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_page_can_be_resumed() {
    let h = harness(BASE, rules(SourceMode::Both, "a", "")).await;
    for n in 1..=3 {
        h.remote.serve(
            n,
            page(
                n,
                3,
                &[video(n, &format!("Show {n}"), REMOTE_CATEGORY, "EP1$u", "")],
            ),
        );
    }
    h.remote.fail(2, true);

    let failed = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert!(matches!(failed.outcome, RunOutcome::Failed { page: 2, .. }));
    assert_eq!(failed.pages_completed, 1);

    let state = h
        .store
        .load_run(h.source.id, ContentKind::Video)
        .await
        .unwrap()
        .expect("run state kept at the failed page");
    assert_eq!(state.current_page, 2);
    assert_eq!(state.total_pages, 3);

    h.remote.fail(2, false);
    let mut request = RunRequest::new(ContentKind::Video);
    request.resume = true;
    let resumed = h.ctx.run(&h.source, request).await.unwrap();

    assert_eq!(resumed.outcome, RunOutcome::Done);
    assert_eq!(resumed.pages_completed, 2);
    assert_eq!(resumed.count("inserted"), 2);
    assert_eq!(h.remote.fetched_pages(), vec![1, 2, 2, 3]);
    assert_eq!(h.store.count_records(ContentKind::Video).await.unwrap(), 3);
}

#[tokio::test]
async fn test_selection_run_covers_one_page() {
    let h = harness(BASE, rules(SourceMode::Both, "a", "")).await;
    h.remote.serve(
        1,
        page(1, 9, &[video(7, "Frieren", REMOTE_CATEGORY, "EP1$u", "")]),
    );

    let mut request = RunRequest::new(ContentKind::Video);
    request.query = request.query.with_ids(vec!["7".into()]);
    let summary = h.ctx.run(&h.source, request).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Done);
    assert_eq!(h.remote.fetched_pages(), vec![1]);
    let url = h.remote.fetched.lock().unwrap()[0].clone();
    assert!(url.contains("ids=7"), "{url}");
}

/// Delegates to the real store, except that the first lookup misses as if
/// another writer inserted the row right after it.
struct LateWriterStore {
    inner: Store,
    missed: AtomicBool,
}

#[async_trait::async_trait]
impl RecordStore for LateWriterStore {
    async fn find_match(&self, key: &DedupKey) -> CollectResult<Option<StoredRecord>> {
        if !self.missed.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_match(key).await
    }

    async fn find_by_fingerprint(
        &self,
        kind: ContentKind,
        fingerprint: &str,
    ) -> CollectResult<Option<StoredRecord>> {
        self.inner.find_by_fingerprint(kind, fingerprint).await
    }

    async fn insert_record(
        &self,
        record: &CanonicalRecord,
        fingerprint: &str,
    ) -> CollectResult<InsertOutcome> {
        self.inner.insert_record(record, fingerprint).await
    }

    async fn update_record(&self, id: i32, patch: &FieldPatch) -> CollectResult<()> {
        self.inner.update_record(id, patch).await
    }
}

#[tokio::test]
async fn test_lost_insert_race_merges_into_winner() {
    let mut h = harness(BASE, rules(SourceMode::Both, "a", "a")).await;
    h.remote.serve(
        1,
        page(1, 1, &[video(1, "Frieren", REMOTE_CATEGORY, "EP1$https://cdn.example.com/1.m3u8", "")]),
    );
    h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();

    h.ctx.records = Arc::new(LateWriterStore {
        inner: h.store.clone(),
        missed: AtomicBool::new(false),
    });
    h.remote.serve(
        1,
        page(1, 1, &[video(1, "Frieren", REMOTE_CATEGORY, "EP2$https://cdn.example.com/2.m3u8", "")]),
    );
    let summary = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();

    assert_eq!(summary.count("updated"), 1, "{:?}", summary.lines);
    assert_eq!(h.store.count_records(ContentKind::Video).await.unwrap(), 1);
    let stored = h.store.get_record(1).await.unwrap().unwrap();
    assert_eq!(
        episode_urls(&stored),
        vec!["https://cdn.example.com/1.m3u8", "https://cdn.example.com/2.m3u8"]
    );
}

fn with_actor(mut record: Value, actor: &str) -> Value {
    record["vod_actor"] = json!(actor);
    record
}

#[tokio::test]
async fn test_record_stays_reachable_after_dedup_column_update() {
    let h = harness(BASE, rules(SourceMode::Both, "af", "f")).await;
    let frieren = |actor: &str| {
        page(1, 1, &[with_actor(video(1, "Frieren", REMOTE_CATEGORY, "EP1$u", ""), actor)])
    };

    h.remote.serve(1, frieren("A,B"));
    let first = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(first.count("inserted"), 1);

    h.remote.serve(1, frieren("A"));
    let narrowed = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(narrowed.count("updated"), 1, "{:?}", narrowed.lines);

    h.remote.serve(1, frieren("A,B"));
    let restored = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(restored.count("failed"), 0, "{:?}", restored.lines);
    assert_eq!(restored.count("updated"), 1, "{:?}", restored.lines);

    assert_eq!(h.store.count_records(ContentKind::Video).await.unwrap(), 1);
    let stored = h.store.get_record(1).await.unwrap().unwrap();
    assert_eq!(stored.text("actor"), "A,B");
}

fn with_pic(mut record: Value, pic: &str) -> Value {
    record["vod_pic"] = json!(pic);
    record
}

#[tokio::test]
async fn test_images_are_only_fetched_for_written_records() {
    let mut h = harness(BASE, rules(SourceMode::Both, "a", "j")).await;
    h.source.sync_images = true;
    let poster = |pic: &str| {
        page(1, 1, &[with_pic(video(1, "Frieren", REMOTE_CATEGORY, "EP1$u", ""), pic)])
    };
    let first_pic = format!("{IMAGE_HOST}frieren-1.jpg");

    h.remote.serve(1, poster(&first_pic));
    let inserted = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(inserted.count("inserted"), 1);
    let stored = h.store.get_record(1).await.unwrap().unwrap();
    assert!(stored.text("pic").starts_with("/upload/video/"), "{}", stored.text("pic"));
    assert_eq!(h.remote.fetched_images(), vec![first_pic.clone()]);

    // The earlier download is reused for the comparison.
    let rerun = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(rerun.count("noChangedFields"), 1, "{:?}", rerun.lines);
    assert_eq!(h.remote.fetched_images(), vec![first_pic.clone()]);

    h.store.set_record_locked(1, true).await.unwrap();
    h.remote.serve(1, poster(&format!("{IMAGE_HOST}frieren-2.jpg")));
    let locked = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(locked.count("recordLocked"), 1);
    assert_eq!(h.remote.fetched_images(), vec![first_pic.clone()]);

    h.store.set_record_locked(1, false).await.unwrap();
    h.source = h
        .source
        .clone()
        .with_rules(ContentKind::Video, rules(SourceMode::Both, "a", ""));
    let no_rule = h.ctx.run(&h.source, RunRequest::new(ContentKind::Video)).await.unwrap();
    assert_eq!(no_rule.count("noRuleConfigured"), 1);
    assert_eq!(h.remote.fetched_images(), vec![first_pic]);
}
