//! Outbound target checks.
//!
//! Every page and image fetch goes through [`ensure_safe_target`] first.
//! Source urls are operator-supplied, but the urls inside a feed are not, so
//! image urls get the same treatment.

use std::net::IpAddr;
use url::{Host, Url};

use crate::collect::error::{CollectError, CollectResult};

fn is_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| v4.is_loopback() || v4.is_unspecified())
        }
    }
}

fn is_local_name(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == "localhost" || host.ends_with(".localhost")
}

/// True when `url` names this machine without any lookup: a literal
/// loopback or unspecified address, a `localhost` name, or no host at all.
#[must_use]
pub fn is_literal_local(url: &Url) -> bool {
    match url.host() {
        None => true,
        Some(Host::Ipv4(ip)) => is_local_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_local_ip(IpAddr::V6(ip)),
        Some(Host::Domain(name)) => is_local_name(name),
    }
}

/// Checks that `raw_url` is http(s) and does not point at this machine.
///
/// Literal loopback and unspecified addresses and `localhost` names are
/// always refused. With `resolve` set, host names are looked up and refused
/// when any address they resolve to is local.
pub async fn ensure_safe_target(raw_url: &str, resolve: bool) -> CollectResult<()> {
    let url = Url::parse(raw_url)
        .map_err(|e| CollectError::UnsafeTarget(format!("{raw_url}: invalid url ({e})")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(CollectError::UnsafeTarget(format!(
            "{raw_url}: unsupported scheme {}",
            url.scheme()
        )));
    }

    let refused = || CollectError::UnsafeTarget(raw_url.to_string());

    if is_literal_local(&url) {
        return Err(refused());
    }

    match url.host() {
        None => Err(refused()),
        Some(Host::Ipv4(_) | Host::Ipv6(_)) => Ok(()),
        Some(Host::Domain(name)) => {
            if !resolve {
                return Ok(());
            }

            let port = url.port_or_known_default().unwrap_or(80);
            let addrs = tokio::net::lookup_host((name, port))
                .await
                .map_err(|e| CollectError::network(raw_url, e))?;

            let mut addrs = addrs.peekable();
            if addrs.peek().is_none() {
                return Err(CollectError::network(raw_url, "host resolved to no address"));
            }
            if addrs.any(|a| is_local_ip(a.ip())) {
                return Err(refused());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refuses_literal_loopback() {
        for url in [
            "http://127.0.0.1/api.php",
            "http://127.8.0.1:8080/",
            "http://0.0.0.0/",
            "http://[::1]/",
            "http://[::ffff:127.0.0.1]/",
            "http://localhost:9000/x",
            "https://api.localhost/",
        ] {
            let err = ensure_safe_target(url, false).await.unwrap_err();
            assert!(matches!(err, CollectError::UnsafeTarget(_)), "{url}");
        }
    }

    #[tokio::test]
    async fn test_accepts_public_targets_without_resolution() {
        ensure_safe_target("https://api.example.com/provide/vod/", false)
            .await
            .unwrap();
        ensure_safe_target("http://203.0.113.9/api.php", false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_refuses_non_http_schemes() {
        let err = ensure_safe_target("file:///etc/passwd", false)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectError::UnsafeTarget(_)));
    }
}
