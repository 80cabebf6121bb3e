//! Process-wide error counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use strum::IntoEnumIterator;
use strum_macros::EnumIter as EnumIterMacro;

use super::RelayError;

/// Failure classes tracked for reporting purposes.
///
/// Each variant represents a distinct way a relayed call can go wrong; the
/// status endpoint exposes the counts and a summary is logged on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
#[allow(missing_docs)]
pub enum ErrorType {
    Validation,
    Timeout,
    Connect,
    Decode,
    UpstreamStatus,
    RiskControl,
    AllEndpointsUnavailable,
    ProxyConfig,
    Other,
}

impl ErrorType {
    /// Human-readable label for logs and the status endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Validation => "validation error",
            ErrorType::Timeout => "request timeout",
            ErrorType::Connect => "connection error",
            ErrorType::Decode => "response decode error",
            ErrorType::UpstreamStatus => "upstream server error",
            ErrorType::RiskControl => "risk control rejection",
            ErrorType::AllEndpointsUnavailable => "no endpoint available",
            ErrorType::ProxyConfig => "proxy configuration error",
            ErrorType::Other => "other request error",
        }
    }
}

/// Thread-safe error statistics tracker.
///
/// Tracks the count of each error type using atomic counters, allowing
/// concurrent access from multiple tasks. All error types are initialized to
/// zero on creation.
pub struct ErrorStats {
    errors: HashMap<ErrorType, AtomicUsize>,
}

impl ErrorStats {
    /// Creates a tracker with every counter at zero.
    pub fn new() -> Self {
        let mut errors = HashMap::new();
        for error in ErrorType::iter() {
            errors.insert(error, AtomicUsize::new(0));
        }
        ErrorStats { errors }
    }

    /// Increments the counter for one failure class.
    pub fn increment(&self, error: ErrorType) {
        // All ErrorType variants are initialized in new()
        if let Some(counter) = self.errors.get(&error) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current count for one failure class.
    pub fn get_count(&self, error: ErrorType) -> usize {
        self.errors
            .get(&error)
            .map(|counter| counter.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Total failures across all classes.
    pub fn total(&self) -> usize {
        ErrorType::iter().map(|e| self.get_count(e)).sum()
    }

    /// Labeled counts for serialization on the status endpoint.
    pub fn counts(&self) -> Vec<(&'static str, usize)> {
        ErrorType::iter()
            .map(|e| (e.as_str(), self.get_count(e)))
            .collect()
    }

    /// Classifies a [`RelayError`] and increments the matching counter.
    pub fn record(&self, error: &RelayError) {
        self.increment(classify(error));
    }

    /// Logs non-zero counters, called once at shutdown.
    pub fn log_summary(&self) {
        let total = self.total();
        if total == 0 {
            log::info!("no request errors recorded");
            return;
        }
        log::info!("{total} request errors recorded:");
        for error in ErrorType::iter() {
            let count = self.get_count(error);
            if count > 0 {
                log::info!("  {}: {count}", error.as_str());
            }
        }
    }
}

impl Default for ErrorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a [`RelayError`] onto its statistics class.
fn classify(error: &RelayError) -> ErrorType {
    match error {
        RelayError::Validation(_) => ErrorType::Validation,
        RelayError::AllEndpointsUnavailable => ErrorType::AllEndpointsUnavailable,
        RelayError::RiskDetected { .. } => ErrorType::RiskControl,
        RelayError::UpstreamStatus { .. } => ErrorType::UpstreamStatus,
        RelayError::MalformedProxyUrl { .. } => ErrorType::ProxyConfig,
        RelayError::Transport { source, .. } => {
            if source.is_timeout() {
                ErrorType::Timeout
            } else if source.is_connect() {
                ErrorType::Connect
            } else if source.is_decode() {
                ErrorType::Decode
            } else {
                ErrorType::Other
            }
        }
        RelayError::Cancelled => ErrorType::Other,
    }
}
