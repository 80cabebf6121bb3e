//! Forward proxy rotation.
//!
//! Once direct attempts start failing, the dispatcher routes escalated
//! attempts through these proxies in round-robin order. Unlike endpoint
//! health, proxy error counts never decay with time; only
//! [`ProxyPool::reset_errors`] restores an exhausted proxy.

use std::collections::HashMap;

use url::Url;

use crate::config::MAX_PROXY_ERRORS;
use crate::error_handling::RelayError;

/// Round-robin pool of forward proxies.
#[derive(Debug)]
pub struct ProxyPool {
    proxies: Vec<Url>,
    cursor: usize,
    errors: HashMap<String, u32>,
}

impl ProxyPool {
    /// Parses and validates the configured proxy URLs.
    ///
    /// Every entry must be an absolute http, https or socks5 URL with a
    /// host. A malformed entry is rejected here, at configuration time,
    /// instead of surfacing as an unusable transport config mid-dispatch.
    pub fn new(urls: &[String]) -> Result<Self, RelayError> {
        let mut proxies = Vec::with_capacity(urls.len());
        for raw in urls {
            let parsed = Url::parse(raw).map_err(|e| RelayError::MalformedProxyUrl {
                url: raw.clone(),
                reason: e.to_string(),
            })?;
            match parsed.scheme() {
                "http" | "https" | "socks5" => {}
                other => {
                    return Err(RelayError::MalformedProxyUrl {
                        url: raw.clone(),
                        reason: format!("unsupported scheme {other}"),
                    });
                }
            }
            if parsed.host_str().is_none() {
                return Err(RelayError::MalformedProxyUrl {
                    url: raw.clone(),
                    reason: "missing host".to_string(),
                });
            }
            proxies.push(parsed);
        }
        Ok(ProxyPool {
            proxies,
            cursor: 0,
            errors: HashMap::new(),
        })
    }

    /// Number of configured proxies.
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    /// Whether the pool has no proxies configured.
    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Number of proxies still under the error threshold.
    pub fn active_len(&self) -> usize {
        self.proxies
            .iter()
            .filter(|proxy| self.error_count(proxy) < MAX_PROXY_ERRORS)
            .count()
    }

    /// Recorded failures for one proxy.
    pub fn error_count(&self, proxy: &Url) -> u32 {
        self.errors.get(proxy.as_str()).copied().unwrap_or(0)
    }

    /// Next usable proxy in round-robin order.
    ///
    /// Scans at most one full lap, advancing the cursor past exhausted
    /// entries, and returns `None` when the pool is empty or every proxy
    /// has hit the error threshold.
    pub fn next_proxy(&mut self) -> Option<Url> {
        if self.proxies.is_empty() {
            return None;
        }
        for _ in 0..self.proxies.len() {
            let proxy = self.proxies[self.cursor].clone();
            self.cursor = (self.cursor + 1) % self.proxies.len();
            if self.error_count(&proxy) < MAX_PROXY_ERRORS {
                return Some(proxy);
            }
        }
        None
    }

    /// Records a failed attempt through a proxy.
    pub fn record_failure(&mut self, proxy: &Url) {
        let count = self.errors.entry(proxy.as_str().to_string()).or_insert(0);
        *count += 1;
        log::warn!("proxy {proxy} error count: {count}");
    }

    /// Clears every proxy error counter. Manual escape hatch for when the
    /// whole pool has been exhausted by a transient outage.
    pub fn reset_errors(&mut self) {
        self.errors.clear();
        log::info!("reset all proxy error counts");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(urls: &[&str]) -> ProxyPool {
        let urls: Vec<String> = urls.iter().map(|s| s.to_string()).collect();
        ProxyPool::new(&urls).expect("valid proxy urls")
    }

    #[test]
    fn test_empty_pool_returns_none() {
        let mut pool = pool(&[]);
        assert!(pool.next_proxy().is_none());
    }

    #[test]
    fn test_round_robin_alternates() {
        let mut pool = pool(&["http://a.test:8080", "http://b.test:8080"]);
        let first = pool.next_proxy().expect("proxy");
        let second = pool.next_proxy().expect("proxy");
        let third = pool.next_proxy().expect("proxy");
        assert_eq!(first.host_str(), Some("a.test"));
        assert_eq!(second.host_str(), Some("b.test"));
        assert_eq!(third.host_str(), Some("a.test"));
    }

    #[test]
    fn test_exhausted_proxy_is_skipped() {
        let mut pool = pool(&["http://a.test:8080", "http://b.test:8080"]);
        let a = pool.next_proxy().expect("proxy");
        for _ in 0..MAX_PROXY_ERRORS {
            pool.record_failure(&a);
        }
        // only b remains in the rotation
        for _ in 0..3 {
            let next = pool.next_proxy().expect("proxy");
            assert_eq!(next.host_str(), Some("b.test"));
        }
    }

    #[test]
    fn test_all_exhausted_terminates_after_one_lap() {
        let mut pool = pool(&["http://a.test:8080", "http://b.test:8080"]);
        let a = pool.next_proxy().expect("proxy");
        let b = pool.next_proxy().expect("proxy");
        for _ in 0..MAX_PROXY_ERRORS {
            pool.record_failure(&a);
            pool.record_failure(&b);
        }
        assert!(pool.next_proxy().is_none());
        assert_eq!(pool.active_len(), 0);
    }

    #[test]
    fn test_reset_restores_exhausted_proxies() {
        let mut pool = pool(&["http://a.test:8080"]);
        let a = pool.next_proxy().expect("proxy");
        for _ in 0..MAX_PROXY_ERRORS {
            pool.record_failure(&a);
        }
        assert!(pool.next_proxy().is_none());

        pool.reset_errors();
        assert!(pool.next_proxy().is_some());
    }

    #[test]
    fn test_malformed_url_rejected() {
        let err = ProxyPool::new(&["not a url".to_string()]).expect_err("must fail");
        assert!(matches!(err, RelayError::MalformedProxyUrl { .. }));
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        let err = ProxyPool::new(&["ftp://a.test:21".to_string()]).expect_err("must fail");
        match err {
            RelayError::MalformedProxyUrl { reason, .. } => {
                assert!(reason.contains("unsupported scheme"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_socks5_scheme_accepted() {
        let pool = pool(&["socks5://a.test:1080"]);
        assert_eq!(pool.len(), 1);
    }
}
