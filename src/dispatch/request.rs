//! Outbound request construction.

use std::time::Duration;

use reqwest::header::{self, HeaderName};
use reqwest::RequestBuilder;
use url::Url;

use crate::config::{DEFAULT_USER_AGENT, UPSTREAM_ORIGIN, UPSTREAM_REFERER};
use crate::error_handling::RelayError;

/// Applies the standard browser-mimicking headers to an outbound request.
///
/// The mirrors reject requests that do not look like the upstream web
/// player, so every attempt carries the same realistic header set. The
/// caller's session cookie, when present, is forwarded verbatim.
pub(crate) fn apply_standard_headers(
    builder: RequestBuilder,
    cookie: Option<&str>,
) -> RequestBuilder {
    let mut builder = builder
        .header(header::USER_AGENT, DEFAULT_USER_AGENT)
        .header(header::REFERER, UPSTREAM_REFERER)
        .header(header::ORIGIN, UPSTREAM_ORIGIN)
        .header(header::ACCEPT, "application/json, text/plain, */*")
        .header(header::ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
        .header(HeaderName::from_static("sec-fetch-dest"), "empty")
        .header(HeaderName::from_static("sec-fetch-mode"), "cors")
        .header(HeaderName::from_static("sec-fetch-site"), "same-site");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
}

/// Builds a client that routes through the given forward proxy.
///
/// The proxy URL was already validated by [`crate::health::ProxyPool`];
/// the scheme comes from the parsed URL, so http, https and socks5
/// proxies all work.
pub(crate) fn proxied_client(proxy: &Url, timeout: Duration) -> Result<reqwest::Client, RelayError> {
    let proxy_scheme =
        reqwest::Proxy::all(proxy.clone()).map_err(|e| RelayError::MalformedProxyUrl {
            url: proxy.to_string(),
            reason: e.to_string(),
        })?;
    reqwest::Client::builder()
        .proxy(proxy_scheme)
        .timeout(timeout)
        .build()
        .map_err(|e| RelayError::MalformedProxyUrl {
            url: proxy.to_string(),
            reason: format!("client build failed: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_headers_applied() {
        let client = reqwest::Client::new();
        let request = apply_standard_headers(client.get("http://localhost/test"), None)
            .build()
            .expect("request builds");
        let headers = request.headers();
        assert_eq!(
            headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()),
            Some(DEFAULT_USER_AGENT)
        );
        assert_eq!(
            headers.get(header::REFERER).and_then(|v| v.to_str().ok()),
            Some(UPSTREAM_REFERER)
        );
        assert!(headers.get(header::COOKIE).is_none());
    }

    #[test]
    fn test_cookie_forwarded_when_present() {
        let client = reqwest::Client::new();
        let request = apply_standard_headers(
            client.get("http://localhost/test"),
            Some("MUSIC_U=abc123"),
        )
        .build()
        .expect("request builds");
        assert_eq!(
            request
                .headers()
                .get(header::COOKIE)
                .and_then(|v| v.to_str().ok()),
            Some("MUSIC_U=abc123")
        );
    }

    #[test]
    fn test_proxied_client_builds_for_valid_proxy() {
        let proxy = Url::parse("http://proxy.test:8080").expect("valid url");
        assert!(proxied_client(&proxy, Duration::from_secs(15)).is_ok());
    }
}
