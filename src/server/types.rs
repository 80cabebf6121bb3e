//! Route input and output shapes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error_handling::RelayError;

/// Body of `POST /login/cellphone`.
#[derive(Debug, Deserialize)]
pub struct CellphoneLoginBody {
    /// Account phone number.
    pub phone: Option<String>,
    /// Account password; either this or `captcha` is required.
    pub password: Option<String>,
    /// SMS captcha; either this or `password` is required.
    pub captcha: Option<String>,
    /// Session cookie to forward upstream.
    pub cookie: Option<String>,
}

/// Body of `POST /captcha/sent`.
#[derive(Debug, Deserialize)]
pub struct CaptchaBody {
    /// Phone number to send the captcha to.
    pub phone: Option<String>,
    /// Session cookie to forward upstream.
    pub cookie: Option<String>,
}

/// Body of the session-cookie routes (`/login/status`, `/login/refresh`).
#[derive(Debug, Deserialize)]
pub struct CookieBody {
    /// Session cookie to forward upstream.
    pub cookie: Option<String>,
}

/// Query of `GET /user/playlist`.
#[derive(Debug, Deserialize)]
pub struct UserPlaylistQuery {
    /// Account identifier whose playlists to fetch.
    pub uid: Option<String>,
    /// Session cookie to forward upstream.
    pub cookie: Option<String>,
}

/// Query of `GET /playlist/detail`.
#[derive(Debug, Deserialize)]
pub struct PlaylistDetailQuery {
    /// Playlist identifier.
    pub id: Option<String>,
    /// Session cookie to forward upstream.
    pub cookie: Option<String>,
}

/// Query of `GET /song/url`.
#[derive(Debug, Deserialize)]
pub struct SongUrlQuery {
    /// Track identifier.
    pub id: Option<String>,
    /// Requested bitrate; defaults to 320kbps.
    pub br: Option<String>,
    /// Session cookie to forward upstream.
    pub cookie: Option<String>,
}

/// Query of `GET /song/detail`.
#[derive(Debug, Deserialize)]
pub struct SongDetailQuery {
    /// Comma-separated track identifiers.
    pub ids: Option<String>,
    /// Session cookie to forward upstream.
    pub cookie: Option<String>,
}

/// Query of `GET /search`.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search keywords.
    pub keywords: Option<String>,
    /// Page size, defaults to 30.
    pub limit: Option<u32>,
    /// Result offset, defaults to 0.
    pub offset: Option<u32>,
    /// Session cookie to forward upstream.
    pub cookie: Option<String>,
}

/// One probe outcome on the `/test` report.
#[derive(Debug, Serialize)]
pub struct ProbeResult {
    /// Which mirror was probed (primary or backup).
    pub api: &'static str,
    /// `success` or `failed`.
    pub status: &'static str,
    /// The probed base URL.
    pub url: String,
    /// Failure detail when the probe did not succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `GET /test`.
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    /// One entry per probed mirror.
    pub results: Vec<ProbeResult>,
    /// When the probes ran (RFC 3339).
    pub timestamp: String,
}

/// Reads a required field, rejecting missing or blank values.
pub(super) fn require<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, RelayError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(value.as_deref().unwrap_or_default()),
        _ => Err(RelayError::Validation(field)),
    }
}

/// A present, non-blank optional field.
pub(super) fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and(value.as_deref())
}

/// Maps a dispatch outcome onto the HTTP response contract.
///
/// Success is an upstream JSON passthrough. Validation failures and
/// risk-control rejections map to 400 (the latter with the upstream's
/// 8810 code and remediation guidance in the body); everything else is a
/// 500 with the error detail attached for diagnostics.
pub(super) fn relay_response(
    state: &super::AppState,
    context: &'static str,
    result: Result<Value, RelayError>,
) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(error) => {
            // Dispatch-level failures were already counted inside dispatch;
            // validation never reaches it.
            if matches!(error, RelayError::Validation(_)) {
                state.dispatcher.stats.record(&error);
            }
            log::error!("{context}: {error}");
            error_response(context, &error)
        }
    }
}

fn error_response(context: &'static str, error: &RelayError) -> Response {
    match error {
        RelayError::Validation(_) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "code": 400,
                "message": error.to_string(),
            })),
        )
            .into_response(),
        RelayError::RiskDetected {
            message,
            suggestion,
            upstream_message,
        } => {
            let mut body = json!({
                "code": crate::config::RISK_CONTROL_CODE,
                "message": message,
                "suggestion": suggestion,
            });
            if let Some(upstream) = upstream_message {
                body["originalMessage"] = json!(upstream);
            }
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "code": 500,
                "message": context,
                "error": other.to_string(),
            })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_rejects_missing_and_blank() {
        assert!(require(&None, "phone").is_err());
        assert!(require(&Some("   ".to_string()), "phone").is_err());
        assert_eq!(
            require(&Some("13800000000".to_string()), "phone").expect("present"),
            "13800000000"
        );
    }

    #[test]
    fn test_non_blank_filters_empty_values() {
        assert_eq!(non_blank(&None), None);
        assert_eq!(non_blank(&Some(String::new())), None);
        assert_eq!(non_blank(&Some("x".to_string())), Some("x"));
    }
}
