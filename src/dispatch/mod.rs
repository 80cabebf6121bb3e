//! Failover dispatch across upstream mirrors.
//!
//! One logical call may span several endpoint attempts: the dispatcher
//! waits for a rate-limiter slot, walks the healthy mirrors in priority
//! order, escalates to forward-proxy routing once the first attempt has
//! failed and normalizes the upstream risk-control rejection into a
//! structured error. Attempts within one dispatch are strictly sequential;
//! concurrent probing would blow through the shared rate budget and
//! muddle failure attribution.

mod request;
mod retry;

pub use retry::dispatch_with_retry;

use std::future::Future;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{Config, RISK_CONTROL_CODE};
use crate::error_handling::{ErrorStats, InitializationError, RelayError};
use crate::health::{HealthTracker, ProxyPool};
use crate::rate_limit::RateLimiter;

/// Per-call options for a dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Session cookie forwarded to the upstream.
    pub cookie: Option<String>,
    /// Query parameters appended to the upstream URL.
    pub query: Vec<(String, String)>,
    /// Per-attempt timeout override; the configured default otherwise.
    pub timeout: Option<Duration>,
    /// Caller-initiated cancellation. Cancelling during the rate-limiter
    /// wait or the in-flight request aborts cleanly without marking any
    /// endpoint as failed.
    pub cancel: Option<CancellationToken>,
}

/// Shared state behind the dispatcher: rate budget, endpoint health,
/// proxy rotation and error statistics.
///
/// Explicitly constructed and owned by the composition root, never
/// ambient; tests build isolated instances. All interior state is guarded,
/// so one instance can serve concurrent callers, which then share a single
/// outbound budget.
pub struct DispatcherState {
    /// Global outbound rate budget.
    pub rate: RateLimiter,
    /// Endpoint availability, in priority order.
    pub health: Mutex<HealthTracker>,
    /// Forward proxy rotation.
    pub proxies: Mutex<ProxyPool>,
    /// Process-wide failure counters.
    pub stats: ErrorStats,
    pub(crate) client: reqwest::Client,
    timeout: Duration,
}

impl DispatcherState {
    /// Creates dispatcher state for the given mirrors and proxy pool.
    pub fn new(
        endpoints: Vec<String>,
        proxies: ProxyPool,
        timeout: Duration,
    ) -> Result<Self, InitializationError> {
        let client = reqwest::Client::builder().build()?;
        Ok(DispatcherState {
            rate: RateLimiter::new(),
            health: Mutex::new(HealthTracker::new(endpoints)),
            proxies: Mutex::new(proxies),
            stats: ErrorStats::new(),
            client,
            timeout,
        })
    }

    /// Builds dispatcher state straight from the runtime configuration.
    pub fn from_config(config: &Config) -> Result<Self, InitializationError> {
        let pool = ProxyPool::new(&config.proxies)?;
        Self::new(config.endpoints_or_default(), pool, config.request_timeout())
    }

    /// Executes one logical upstream call with endpoint failover.
    ///
    /// Waits for a rate-limiter slot, then tries each currently-available
    /// endpoint in priority order. After the first failed attempt, the
    /// remaining attempts are routed through the proxy rotation. A response
    /// whose body carries the risk-control code counts as a failure and
    /// moves on to the next endpoint; any other response is returned
    /// immediately. When every endpoint has been tried, the last error is
    /// surfaced.
    ///
    /// Timeouts are per attempt, not per call: a dispatch that fails over
    /// across N endpoints may take up to N times the attempt timeout.
    pub async fn dispatch(
        &self,
        path: &str,
        method: Method,
        payload: Option<&Value>,
        opts: &DispatchOptions,
    ) -> Result<Value, RelayError> {
        // A cancelled rate wait leaves no health marks behind.
        cancellable(opts, self.rate.acquire_slot()).await?;

        let available = self.health.lock().await.list_available(Instant::now());
        if available.is_empty() {
            self.stats.record(&RelayError::AllEndpointsUnavailable);
            return Err(RelayError::AllEndpointsUnavailable);
        }

        let mut last_error: Option<RelayError> = None;
        // Latched once the first attempt fails; every later attempt in this
        // call then asks the rotation for a proxy.
        let mut escalate_to_proxy = false;

        for endpoint in &available {
            let proxy = if escalate_to_proxy {
                self.proxies.lock().await.next_proxy()
            } else {
                None
            };
            if let Some(proxy) = &proxy {
                log::info!("retrying via proxy {proxy}");
            }
            log::debug!("attempting {endpoint}{path}");

            let attempt = self.attempt(endpoint, proxy.as_ref(), path, &method, payload, opts);
            match cancellable(opts, attempt).await? {
                Ok(body) => {
                    let code = body.get("code").and_then(Value::as_i64);
                    if code == Some(RISK_CONTROL_CODE) {
                        log::warn!("endpoint {endpoint} rejected the request via risk control");
                        self.record_attempt_failure(endpoint, proxy.as_ref()).await;
                        let upstream_message = body
                            .get("message")
                            .and_then(Value::as_str)
                            .map(str::to_string);
                        let error = RelayError::risk_detected(upstream_message);
                        self.stats.record(&error);
                        last_error = Some(error);
                        escalate_to_proxy = true;
                        continue;
                    }

                    log::debug!("endpoint {endpoint} answered with code {code:?}");
                    self.health
                        .lock()
                        .await
                        .record_success(endpoint, Instant::now());
                    return Ok(body);
                }
                Err(error) => {
                    log::warn!("request to {endpoint} failed: {error}");
                    self.record_attempt_failure(endpoint, proxy.as_ref()).await;
                    self.stats.record(&error);
                    last_error = Some(error);
                    escalate_to_proxy = true;
                }
            }
        }

        // Every candidate was tried without a usable response.
        Err(last_error.unwrap_or(RelayError::AllEndpointsUnavailable))
    }

    /// Sends one request to one endpoint, possibly through a proxy.
    async fn attempt(
        &self,
        endpoint: &str,
        proxy: Option<&Url>,
        path: &str,
        method: &Method,
        payload: Option<&Value>,
        opts: &DispatchOptions,
    ) -> Result<Value, RelayError> {
        let timeout = opts.timeout.unwrap_or(self.timeout);
        let proxied;
        let client = match proxy {
            Some(proxy) => {
                proxied = request::proxied_client(proxy, timeout)?;
                &proxied
            }
            None => &self.client,
        };

        let url = format!("{endpoint}{path}");
        let mut builder = client.request(method.clone(), &url).timeout(timeout);
        if !opts.query.is_empty() {
            builder = builder.query(&opts.query);
        }
        if let Some(body) = payload {
            builder = builder.json(body);
        }
        builder = request::apply_standard_headers(builder, opts.cookie.as_deref());

        let response = builder
            .send()
            .await
            .map_err(|source| RelayError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(RelayError::UpstreamStatus {
                endpoint: endpoint.to_string(),
                status,
            });
        }

        // Statuses below 500 carry inspectable bodies, business errors
        // included, so they are decoded rather than treated as failures.
        response
            .json::<Value>()
            .await
            .map_err(|source| RelayError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })
    }

    async fn record_attempt_failure(&self, endpoint: &str, proxy: Option<&Url>) {
        self.health
            .lock()
            .await
            .record_failure(endpoint, Instant::now());
        if let Some(proxy) = proxy {
            self.proxies.lock().await.record_failure(proxy);
        }
    }
}

/// Races a future against the caller's cancellation token.
///
/// Cancellation wins ties so an already-cancelled dispatch never starts
/// new work.
async fn cancellable<T>(
    opts: &DispatchOptions,
    fut: impl Future<Output = T>,
) -> Result<T, RelayError> {
    match &opts.cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(RelayError::Cancelled),
                value = fut => Ok(value),
            }
        }
        None => Ok(fut.await),
    }
}
