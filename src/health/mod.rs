//! Upstream endpoint health tracking.
//!
//! The dispatcher consults this tracker before every call so known-bad
//! mirrors are skipped. Records are created lazily on first read, live in
//! memory only and reset with the process.

mod proxy;

pub use proxy::ProxyPool;

use std::collections::HashMap;

use tokio::time::Instant;

use crate::config::{ENDPOINT_COOLDOWN, MAX_ENDPOINT_ERRORS};

/// Tracked state for one upstream mirror.
#[derive(Debug, Clone, Copy)]
pub struct EndpointRecord {
    /// Whether the dispatcher may currently use this endpoint.
    pub available: bool,
    /// Consecutive failures since the last success.
    pub error_count: u32,
    /// When the endpoint was last checked (success or failure).
    pub last_check: Instant,
}

impl EndpointRecord {
    fn fresh(now: Instant) -> Self {
        EndpointRecord {
            available: true,
            error_count: 0,
            last_check: now,
        }
    }
}

/// Applies the cool-down rule to a record.
///
/// Once [`ENDPOINT_COOLDOWN`] has passed since the last check, the record
/// returns to its fresh state regardless of prior failures. Pure, so the
/// time-decay rule lives in exactly one place and is applied at every read.
pub(crate) fn reconcile(record: EndpointRecord, now: Instant) -> EndpointRecord {
    if now.duration_since(record.last_check) > ENDPOINT_COOLDOWN {
        EndpointRecord::fresh(now)
    } else {
        record
    }
}

/// Per-endpoint availability in fixed priority order.
pub struct HealthTracker {
    endpoints: Vec<String>,
    states: HashMap<String, EndpointRecord>,
}

impl HealthTracker {
    /// Creates a tracker for the given mirrors, in priority order.
    pub fn new(endpoints: Vec<String>) -> Self {
        HealthTracker {
            endpoints,
            states: HashMap::new(),
        }
    }

    /// Reconciled state of every configured endpoint, in priority order.
    pub fn snapshot(&mut self, now: Instant) -> Vec<(String, EndpointRecord)> {
        let mut records = Vec::with_capacity(self.endpoints.len());
        for url in &self.endpoints {
            let record = self
                .states
                .entry(url.clone())
                .or_insert_with(|| EndpointRecord::fresh(now));
            *record = reconcile(*record, now);
            records.push((url.clone(), *record));
        }
        records
    }

    /// Endpoints the dispatcher may currently try, in priority order.
    ///
    /// Endpoints never seen before default to available; unavailable ones
    /// are revived by the cool-down rule in [`reconcile`].
    pub fn list_available(&mut self, now: Instant) -> Vec<String> {
        self.snapshot(now)
            .into_iter()
            .filter(|(_, record)| record.available)
            .map(|(url, _)| url)
            .collect()
    }

    /// Records a failed attempt against an endpoint.
    ///
    /// At [`MAX_ENDPOINT_ERRORS`] consecutive failures the endpoint is
    /// marked unavailable.
    pub fn record_failure(&mut self, endpoint: &str, now: Instant) {
        let record = self
            .states
            .entry(endpoint.to_string())
            .or_insert_with(|| EndpointRecord::fresh(now));
        record.error_count += 1;
        record.last_check = now;
        if record.error_count >= MAX_ENDPOINT_ERRORS {
            record.available = false;
            log::warn!(
                "endpoint {endpoint} marked unavailable after {} consecutive errors",
                record.error_count
            );
        }
    }

    /// Records a successful response, resetting the failure streak.
    pub fn record_success(&mut self, endpoint: &str, now: Instant) {
        let record = self
            .states
            .entry(endpoint.to_string())
            .or_insert_with(|| EndpointRecord::fresh(now));
        record.error_count = 0;
        record.available = true;
        record.last_check = now;
    }
}
