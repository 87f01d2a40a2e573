use reqwest::Client;
use reqwest::redirect::Policy;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::clients::safety::is_literal_local;
use crate::collect::error::{CollectError, CollectResult};
use crate::collect::schema::schema;
use crate::domain::ContentKind;

/// Query parameters of the remote collection API.
///
/// `ac` selects the action, `t` the remote category, `pg` the page, `h` the
/// "updated within N hours" window, `ids` an explicit selection and `wd` a
/// keyword.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedQuery {
    pub action: String,
    pub type_id: Option<String>,
    pub page: Option<u32>,
    pub hours: Option<u32>,
    pub ids: Vec<String>,
    pub keyword: Option<String>,
}

impl FeedQuery {
    /// The taxonomy listing (`ac=list`).
    #[must_use]
    pub fn taxonomy() -> Self {
        Self {
            action: "list".to_string(),
            ..Default::default()
        }
    }

    /// A detailed record listing for one kind.
    #[must_use]
    pub fn records(kind: ContentKind) -> Self {
        Self {
            action: schema(kind).list_action.to_string(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_type(mut self, type_id: Option<String>) -> Self {
        self.type_id = type_id.filter(|t| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub const fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub const fn with_hours(mut self, hours: Option<u32>) -> Self {
        self.hours = hours;
        self
    }

    #[must_use]
    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn with_keyword(mut self, keyword: Option<String>) -> Self {
        self.keyword = keyword.filter(|k| !k.trim().is_empty());
        self
    }

    /// A run with an explicit id list covers a single page.
    #[must_use]
    pub fn is_selection(&self) -> bool {
        !self.ids.is_empty()
    }

    /// Full request url: base, encoded parameters, then the source's suffix
    /// appended verbatim.
    pub fn build_url(&self, base: &str, suffix: &str) -> CollectResult<String> {
        let mut url = Url::parse(base.trim())
            .map_err(|e| CollectError::Config(format!("invalid source url {base}: {e}")))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("ac", &self.action);
            if let Some(t) = &self.type_id {
                pairs.append_pair("t", t);
            }
            if let Some(pg) = self.page {
                pairs.append_pair("pg", &pg.to_string());
            }
            if let Some(h) = self.hours {
                pairs.append_pair("h", &h.to_string());
            }
            if !self.ids.is_empty() {
                pairs.append_pair("ids", &self.ids.join(","));
            }
            if let Some(wd) = &self.keyword {
                pairs.append_pair("wd", wd);
            }
        }

        let mut out = url.to_string();
        let suffix = suffix.trim().trim_start_matches(['&', '?']);
        if !suffix.is_empty() {
            out.push('&');
            out.push_str(suffix);
        }
        Ok(out)
    }
}

const MAX_REDIRECTS: usize = 5;

/// Whether a redirect to `target` may be followed after `hops` earlier
/// redirects. Hops to local targets are refused like the first request.
fn check_redirect(target: &Url, hops: usize) -> Result<(), String> {
    if hops >= MAX_REDIRECTS {
        return Err(format!("more than {MAX_REDIRECTS} redirects"));
    }
    if !matches!(target.scheme(), "http" | "https") {
        return Err(format!("redirect to unsupported scheme {}", target.scheme()));
    }
    if is_literal_local(target) {
        return Err(format!("redirect to unsafe target {target}"));
    }
    Ok(())
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        match check_redirect(attempt.url(), attempt.previous().len()) {
            Ok(()) => attempt.follow(),
            Err(reason) => attempt.error(reason),
        }
    })
}

/// Fetches raw bytes from a remote url.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CollectResult<Vec<u8>>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    max_bytes: Option<u64>,
}

impl HttpFetcher {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(redirect_policy())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            max_bytes: None,
        })
    }

    /// Refuse bodies larger than `max_bytes`.
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> CollectResult<Vec<u8>> {
        debug!(event = "remote.fetch", url = %url, "Fetching");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CollectError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectError::network(url, format!("HTTP {status}")));
        }

        if let (Some(limit), Some(len)) = (self.max_bytes, response.content_length())
            && len > limit
        {
            return Err(CollectError::network(
                url,
                format!("body of {len} bytes exceeds limit of {limit}"),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CollectError::network(url, e))?;

        if let Some(limit) = self.max_bytes
            && bytes.len() as u64 > limit
        {
            return Err(CollectError::network(
                url,
                format!("body exceeds limit of {limit} bytes"),
            ));
        }

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_record_query_with_suffix() {
        let query = FeedQuery::records(ContentKind::Video)
            .with_type(Some("6".into()))
            .with_page(3)
            .with_hours(Some(24));

        let url = query
            .build_url("https://api.example.com/provide/vod/", "&key=abc&at=xml")
            .unwrap();

        assert_eq!(
            url,
            "https://api.example.com/provide/vod/?ac=videolist&t=6&pg=3&h=24&key=abc&at=xml"
        );
    }

    #[test]
    fn test_selection_and_keyword_are_encoded() {
        let query = FeedQuery::records(ContentKind::Article)
            .with_ids(vec!["1".into(), "2".into()])
            .with_keyword(Some("葬送".into()));

        assert!(query.is_selection());
        let url = query.build_url("https://api.example.com/art", "").unwrap();
        assert_eq!(
            url,
            "https://api.example.com/art?ac=detail&ids=1%2C2&wd=%E8%91%AC%E9%80%81"
        );
    }

    #[test]
    fn test_taxonomy_query() {
        let url = FeedQuery::taxonomy()
            .build_url("https://api.example.com/provide/vod/?at=json", "")
            .unwrap();
        assert_eq!(url, "https://api.example.com/provide/vod/?at=json&ac=list");
    }

    #[test]
    fn test_redirects_to_local_targets_are_refused() {
        for target in [
            "http://127.0.0.1/admin",
            "http://[::1]:8080/",
            "http://localhost/x",
            "http://0.0.0.0/",
            "file:///etc/passwd",
        ] {
            let url = Url::parse(target).unwrap();
            assert!(check_redirect(&url, 0).is_err(), "{target}");
        }
    }

    #[test]
    fn test_redirects_to_public_targets_are_followed_up_to_limit() {
        let url = Url::parse("https://cdn.example.com/poster.jpg").unwrap();
        assert!(check_redirect(&url, 0).is_ok());
        assert!(check_redirect(&url, MAX_REDIRECTS - 1).is_ok());
        assert!(check_redirect(&url, MAX_REDIRECTS).is_err());
    }

    #[test]
    fn test_invalid_base_is_config_error() {
        let err = FeedQuery::taxonomy().build_url("not a url", "").unwrap_err();
        assert!(matches!(err, CollectError::Config(_)));
    }
}
