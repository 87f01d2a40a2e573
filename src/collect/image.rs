//! Localization of remote images referenced by records.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clients::{Fetcher, ensure_safe_target};
use crate::collect::error::{CollectError, CollectResult};
use crate::domain::ContentKind;

const FAILURE_MARKER: &str = "#err";
const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Result of one sync: the url to store, plus a note when it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedImage {
    pub url: String,
    pub note: Option<String>,
}

impl SyncedImage {
    fn unchanged(url: &str) -> Self {
        Self {
            url: url.to_string(),
            note: None,
        }
    }
}

/// Drops a failure marker left by an earlier attempt.
#[must_use]
pub fn strip_failure_marker(url: &str) -> &str {
    url.split_once(FAILURE_MARKER).map_or(url, |(head, _)| head)
}

fn extension_for(url: &str, bytes: &[u8]) -> &'static str {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();

    if let Some(ext) = Path::new(&path).extension().and_then(|e| e.to_str())
        && let Some(known) = KNOWN_EXTENSIONS.iter().find(|k| **k == ext)
    {
        return *known;
    }

    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "png",
        [b'G', b'I', b'F', ..] => "gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "webp",
        [b'B', b'M', ..] => "bmp",
        _ => "jpg",
    }
}

pub struct ImageSynchronizer {
    fetcher: Arc<dyn Fetcher>,
    root: PathBuf,
    public_prefix: String,
    resolve_hosts: bool,
}

impl ImageSynchronizer {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        root: impl Into<PathBuf>,
        public_prefix: &str,
        resolve_hosts: bool,
    ) -> Self {
        Self {
            fetcher,
            root: root.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
            resolve_hosts,
        }
    }

    /// Localizes `url` when `enabled`.
    ///
    /// Urls that are not http(s) are taken to be local already and come back
    /// unchanged. On failure the remote url comes back with a dated
    /// `#errYYYY-MM-DD` marker so the next run retries it.
    pub async fn sync(&self, url: &str, enabled: bool, kind: ContentKind) -> SyncedImage {
        let trimmed = url.trim();
        if !enabled || trimmed.is_empty() {
            return SyncedImage::unchanged(url);
        }

        let remote = strip_failure_marker(trimmed);
        if !(remote.starts_with("http://") || remote.starts_with("https://")) {
            return SyncedImage::unchanged(url);
        }

        match self.localize(remote, kind).await {
            Ok(local) => {
                debug!(event = "image.synced", url = %remote, local = %local, "Image localized");
                SyncedImage {
                    url: local,
                    note: None,
                }
            }
            Err(e) => {
                warn!(event = "image.sync_failed", url = %remote, error = %e, "Image sync failed");
                metrics::counter!("collect_image_failures_total").increment(1);
                SyncedImage {
                    url: format!("{remote}{FAILURE_MARKER}{}", Utc::now().format("%Y-%m-%d")),
                    note: Some(e.to_string()),
                }
            }
        }
    }

    /// Local url of a copy of `url` downloaded by an earlier run. Never
    /// fetches.
    pub async fn existing(&self, url: &str, enabled: bool, kind: ContentKind) -> Option<String> {
        let remote = strip_failure_marker(url.trim());
        if !enabled || !(remote.starts_with("http://") || remote.starts_with("https://")) {
            return None;
        }
        self.find_local(remote, kind).await
    }

    fn stem_for(url: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).to_string()
    }

    async fn find_local(&self, url: &str, kind: ContentKind) -> Option<String> {
        let stem = Self::stem_for(url);
        let dir = self.root.join(kind.as_str());
        for ext in KNOWN_EXTENSIONS {
            let file = format!("{stem}.{ext}");
            if tokio::fs::try_exists(dir.join(&file)).await.unwrap_or(false) {
                return Some(format!("{}/{kind}/{file}", self.public_prefix));
            }
        }
        None
    }

    async fn localize(&self, url: &str, kind: ContentKind) -> CollectResult<String> {
        let failure = |reason: String| CollectError::ImageSyncFailure {
            url: url.to_string(),
            reason,
        };

        ensure_safe_target(url, self.resolve_hosts)
            .await
            .map_err(|e| failure(e.to_string()))?;

        if let Some(local) = self.find_local(url, kind).await {
            return Ok(local);
        }

        let stem = Self::stem_for(url);
        let dir = self.root.join(kind.as_str());

        let bytes = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| failure(e.to_string()))?;
        if bytes.is_empty() {
            return Err(failure("empty body".to_string()));
        }

        let file = format!("{stem}.{}", extension_for(url, &bytes));

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| failure(format!("create {}: {e}", dir.display())))?;
        tokio::fs::write(dir.join(&file), &bytes)
            .await
            .map_err(|e| failure(format!("write {file}: {e}")))?;

        Ok(format!("{}/{kind}/{file}", self.public_prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticFetcher(CollectResult<Vec<u8>>);

    #[async_trait::async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> CollectResult<Vec<u8>> {
            match &self.0 {
                Ok(bytes) => Ok(bytes.clone()),
                Err(e) => Err(CollectError::network(url, e)),
            }
        }
    }

    fn synchronizer(result: CollectResult<Vec<u8>>) -> (ImageSynchronizer, PathBuf) {
        let root = std::env::temp_dir().join(format!("collect-images-{}", Uuid::new_v4()));
        let sync = ImageSynchronizer::new(Arc::new(StaticFetcher(result)), &root, "/upload/", false);
        (sync, root)
    }

    #[tokio::test]
    async fn test_localizes_into_kind_directory() {
        let (sync, root) = synchronizer(Ok(b"\x89PNG\r\n".to_vec()));

        let out = sync
            .sync("https://img.example.com/cover?id=3", true, ContentKind::Video)
            .await;

        assert!(out.note.is_none());
        assert!(out.url.starts_with("/upload/video/"), "{}", out.url);
        assert!(out.url.ends_with(".png"));

        let file = out.url.trim_start_matches("/upload/video/");
        assert!(root.join("video").join(file).exists());
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_same_url_maps_to_same_file() {
        let (sync, root) = synchronizer(Ok(b"jpegdata".to_vec()));
        let a = sync.sync("https://img.example.com/a.jpg", true, ContentKind::Actor).await;
        let b = sync
            .sync("https://img.example.com/a.jpg#err2026-01-01", true, ContentKind::Actor)
            .await;
        assert_eq!(a.url, b.url);
        assert!(a.url.ends_with(".jpg"));
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_failure_returns_dated_marker() {
        let (sync, _root) = synchronizer(Err(CollectError::MalformedFeed("boom".into())));
        let out = sync.sync("https://img.example.com/a.jpg", true, ContentKind::Video).await;

        let today = Utc::now().format("%Y-%m-%d").to_string();
        assert_eq!(out.url, format!("https://img.example.com/a.jpg#err{today}"));
        assert!(out.note.is_some());
    }

    #[tokio::test]
    async fn test_loopback_image_is_refused() {
        let (sync, _root) = synchronizer(Ok(b"x".to_vec()));
        let out = sync.sync("http://127.0.0.1/a.jpg", true, ContentKind::Video).await;
        assert!(out.url.starts_with("http://127.0.0.1/a.jpg#err"));
    }

    #[tokio::test]
    async fn test_existing_finds_earlier_download_only() {
        let (sync, root) = synchronizer(Ok(b"\x89PNG\r\n".to_vec()));
        let url = "https://img.example.com/poster";

        assert_eq!(sync.existing(url, true, ContentKind::Video).await, None);

        let synced = sync.sync(url, true, ContentKind::Video).await;
        assert_eq!(
            sync.existing(url, true, ContentKind::Video).await,
            Some(synced.url)
        );
        assert_eq!(sync.existing(url, false, ContentKind::Video).await, None);
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_disabled_and_local_urls_pass_through() {
        let (sync, _root) = synchronizer(Ok(b"x".to_vec()));
        let off = sync.sync("https://img.example.com/a.jpg", false, ContentKind::Video).await;
        assert_eq!(off.url, "https://img.example.com/a.jpg");

        let local = sync.sync("/upload/video/x.jpg", true, ContentKind::Video).await;
        assert_eq!(local.url, "/upload/video/x.jpg");
    }
}
