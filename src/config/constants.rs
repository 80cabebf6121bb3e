//! Service-wide constants and defaults.

use std::time::Duration;

// Upstream mirrors, in fixed priority order
/// Primary upstream API mirror.
pub const PRIMARY_API_BASE: &str = "https://netease-cloud-music-api-one-psi.vercel.app";
/// Backup mirror, tried when the primary is unhealthy or failing.
pub const BACKUP_API_BASE: &str = "https://netease-cloud-music-api-git-master-binaryify.vercel.app";
/// Tertiary mirror, last in the priority order.
pub const TERTIARY_API_BASE: &str = "https://music-api.heheda.top";

// Endpoint health
/// Consecutive failures after which an endpoint is marked unavailable.
pub const MAX_ENDPOINT_ERRORS: u32 = 3;
/// An unavailable endpoint is reconsidered after this long without a check.
pub const ENDPOINT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

// Proxy rotation
/// Consecutive failures after which a proxy is dropped from the rotation.
///
/// Proxy error counts never decay with time; only an explicit reset
/// restores an exhausted proxy.
pub const MAX_PROXY_ERRORS: u32 = 3;

// Outbound rate budget
/// Maximum outbound requests per rate window.
pub const MAX_REQUESTS_PER_WINDOW: u32 = 30;
/// Length of the sliding rate window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);
/// Minimum spacing between consecutive outbound requests.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1000);

// Timeouts
/// Default per-attempt timeout for dispatched requests.
pub const REQUEST_TIMEOUT_SECS: u64 = 15;
/// Timeout for the direct connectivity probes served by `/test`.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// Retry strategy
/// Total attempts (first try plus retries) for retry-wrapped call sites.
pub const RETRY_MAX_ATTEMPTS: usize = 3;
/// Base step of the linear retry backoff (1s after the first failure, 2s
/// after the second).
pub const RETRY_BACKOFF_STEP: Duration = Duration::from_millis(1000);

// Upstream risk control
/// Application-level code the upstream embeds in a response when its own
/// anti-abuse heuristics rejected the request. The HTTP status is usually
/// still 200, so the code must be read out of the body.
pub const RISK_CONTROL_CODE: i64 = 8810;
/// User-facing message for a risk-control rejection.
pub const RISK_CONTROL_MESSAGE: &str =
    "The current network environment was flagged as a security risk by the upstream service; please retry later or switch networks";
/// Remediation guidance attached to a risk-control rejection.
pub const RISK_CONTROL_SUGGESTION: &str =
    "Suggestions: 1. retry later 2. switch network environment 3. use a cellular connection 4. configure a relay proxy";

// Outbound request identity
/// Default User-Agent string for outbound requests.
///
/// Uses a Chrome-like string matching what the upstream web player would
/// send. The mirrors sit in front of an anti-abuse layer that inspects
/// headers, so the relay presents a realistic browser fingerprint.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
/// Referer presented to the mirrors; matches the upstream web player.
pub const UPSTREAM_REFERER: &str = "https://music.163.com/";
/// Origin presented to the mirrors.
pub const UPSTREAM_ORIGIN: &str = "https://music.163.com";

// Route parameter defaults
/// Bitrate requested for track playback URLs when the caller omits one.
pub const DEFAULT_SONG_BITRATE: &str = "320000";
/// Page size for search when the caller omits one.
pub const DEFAULT_SEARCH_LIMIT: u32 = 30;
/// Search offset when the caller omits one.
pub const DEFAULT_SEARCH_OFFSET: u32 = 0;
/// Upstream search type for single-track search.
pub const SEARCH_TYPE_SONG: u32 = 1;
