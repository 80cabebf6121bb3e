//! Error types for the relay.

use log::SetLoggerError;
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::{RISK_CONTROL_MESSAGE, RISK_CONTROL_SUGGESTION};

/// Error types for initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    /// Invalid proxy configuration.
    #[error("Proxy configuration error: {0}")]
    ProxyConfigError(#[from] RelayError),
}

/// Failures a dispatch or route operation can surface.
///
/// Variants fall into two retry classes: [`RelayError::Transport`] and
/// [`RelayError::UpstreamStatus`] are transient and eligible for the bounded
/// caller-level retry; everything else fails fast.
#[derive(Error, Debug)]
pub enum RelayError {
    /// A required input field was missing or empty. Rejected before any
    /// network activity.
    #[error("missing required parameter: {0}")]
    Validation(&'static str),

    /// Every configured endpoint is currently marked unavailable.
    #[error("all upstream endpoints are temporarily unavailable, try again later")]
    AllEndpointsUnavailable,

    /// The upstream's risk control rejected the request.
    ///
    /// The code is embedded in an otherwise successful response body, so
    /// this is an application-level rejection, not a transport failure.
    /// Callers present the remediation guidance instead of a generic error.
    #[error("{message}")]
    RiskDetected {
        /// Fixed user-facing description of the rejection.
        message: String,
        /// Fixed remediation guidance.
        suggestion: String,
        /// The upstream's own message, when one was present in the body.
        upstream_message: Option<String>,
    },

    /// Network-level failure reaching an endpoint (timeout, refused
    /// connection, DNS, undecodable body).
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        /// Base URL of the endpoint that failed.
        endpoint: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a server error status.
    #[error("{endpoint} returned HTTP {status}")]
    UpstreamStatus {
        /// Base URL of the endpoint that failed.
        endpoint: String,
        /// The status it returned.
        status: StatusCode,
    },

    /// A configured proxy URL could not be turned into a usable transport
    /// configuration.
    #[error("malformed proxy url {url}: {reason}")]
    MalformedProxyUrl {
        /// The offending URL as configured.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The caller aborted the dispatch. No endpoint health is recorded for
    /// a cancelled attempt, since the failure was not the endpoint's fault.
    #[error("dispatch cancelled by caller")]
    Cancelled,
}

impl RelayError {
    /// Builds the normalized risk-control rejection with the fixed
    /// remediation text.
    pub fn risk_detected(upstream_message: Option<String>) -> Self {
        RelayError::RiskDetected {
            message: RISK_CONTROL_MESSAGE.to_string(),
            suggestion: RISK_CONTROL_SUGGESTION.to_string(),
            upstream_message,
        }
    }

    /// Whether the bounded caller-level retry should try again.
    ///
    /// Risk-control rejections are deliberately excluded: retrying them
    /// feeds the upstream's abuse heuristics and the user needs to act
    /// (switch networks, configure a proxy) rather than wait.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            RelayError::Transport { .. } | RelayError::UpstreamStatus { .. }
        )
    }

    /// Whether this is the upstream risk-control rejection.
    pub fn is_risk(&self) -> bool {
        matches!(self, RelayError::RiskDetected { .. })
    }
}
