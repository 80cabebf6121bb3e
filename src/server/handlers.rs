//! Thin request adapters over the failover dispatcher.
//!
//! Every handler validates its input, builds the upstream payload and
//! delegates to the dispatcher; responses are upstream JSON passthrough.
//! Idempotent reads and the captcha flow go through the bounded retry
//! wrapper; password login and session refresh dispatch once.

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::config::{
    DEFAULT_SEARCH_LIMIT, DEFAULT_SEARCH_OFFSET, DEFAULT_SONG_BITRATE, PROBE_TIMEOUT,
    SEARCH_TYPE_SONG,
};
use crate::dispatch::{dispatch_with_retry, DispatchOptions};
use crate::error_handling::RelayError;

use super::types::{
    non_blank, relay_response, require, CaptchaBody, CellphoneLoginBody, CookieBody,
    PlaylistDetailQuery, ProbeReport, ProbeResult, SearchQuery, SongDetailQuery, SongUrlQuery,
    UserPlaylistQuery,
};
use super::AppState;

/// Probes the primary and backup mirrors directly, bypassing the
/// dispatcher, so operators can tell mirror outages apart from relay
/// problems.
pub(super) async fn test_connectivity(State(state): State<AppState>) -> Json<ProbeReport> {
    let labels = ["primary", "backup"];
    let mut results = Vec::new();
    for (label, base) in labels.into_iter().zip(state.endpoints.iter()) {
        results.push(probe(&state, label, base).await);
    }
    Json(ProbeReport {
        results,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn probe(state: &AppState, api: &'static str, base: &str) -> ProbeResult {
    let outcome = state
        .dispatcher
        .client
        .get(format!("{base}/login/status"))
        .timeout(PROBE_TIMEOUT)
        .send()
        .await;
    match outcome {
        Ok(response) if response.status().is_success() => ProbeResult {
            api,
            status: "success",
            url: base.to_string(),
            error: None,
        },
        Ok(response) => ProbeResult {
            api,
            status: "failed",
            url: base.to_string(),
            error: Some(format!("HTTP {}", response.status())),
        },
        Err(e) => ProbeResult {
            api,
            status: "failed",
            url: base.to_string(),
            error: Some(e.to_string()),
        },
    }
}

/// Relay health snapshot: endpoint availability, proxy rotation state and
/// failure counters.
pub(super) async fn relay_status(State(state): State<AppState>) -> Json<Value> {
    let endpoints = state.dispatcher.health.lock().await.snapshot(Instant::now());
    let proxies = state.dispatcher.proxies.lock().await;
    let errors: serde_json::Map<String, Value> = state
        .dispatcher
        .stats
        .counts()
        .into_iter()
        .map(|(name, count)| (name.to_string(), json!(count)))
        .collect();

    Json(json!({
        "endpoints": endpoints
            .iter()
            .map(|(url, record)| json!({
                "url": url,
                "available": record.available,
                "error_count": record.error_count,
            }))
            .collect::<Vec<_>>(),
        "proxies": {
            "configured": proxies.len(),
            "active": proxies.active_len(),
        },
        "errors": errors,
    }))
}

/// `POST /login/cellphone`: password or captcha login.
pub(super) async fn login_cellphone(
    State(state): State<AppState>,
    Json(body): Json<CellphoneLoginBody>,
) -> Response {
    let result = async {
        let phone = require(&body.phone, "phone")?;
        let password = non_blank(&body.password);
        let captcha = non_blank(&body.captcha);
        if password.is_none() && captcha.is_none() {
            return Err(RelayError::Validation("password or captcha"));
        }

        log::info!("login requested for account ending in {}", tail(phone));

        let mut payload = json!({ "phone": phone });
        if let Some(password) = password {
            payload["password"] = json!(password);
        }
        if let Some(captcha) = captcha {
            payload["captcha"] = json!(captcha);
        }
        let opts = DispatchOptions {
            cookie: body.cookie.clone(),
            ..Default::default()
        };

        // Captcha logins tolerate a repeat; password logins dispatch once.
        if captcha.is_some() {
            dispatch_with_retry(
                &state.dispatcher,
                "/login/cellphone",
                Method::POST,
                Some(&payload),
                &opts,
            )
            .await
        } else {
            state
                .dispatcher
                .dispatch("/login/cellphone", Method::POST, Some(&payload), &opts)
                .await
        }
    }
    .await;
    relay_response(&state, "login failed", result)
}

/// `POST /captcha/sent`: sends an SMS captcha.
pub(super) async fn captcha_sent(
    State(state): State<AppState>,
    Json(body): Json<CaptchaBody>,
) -> Response {
    let result = async {
        let phone = require(&body.phone, "phone")?;
        let payload = json!({ "phone": phone });
        let opts = DispatchOptions {
            cookie: body.cookie.clone(),
            ..Default::default()
        };
        dispatch_with_retry(
            &state.dispatcher,
            "/captcha/sent",
            Method::POST,
            Some(&payload),
            &opts,
        )
        .await
    }
    .await;
    relay_response(&state, "failed to send captcha", result)
}

/// `POST /login/status`: checks whether the forwarded cookie is still a
/// valid session.
pub(super) async fn login_status(
    State(state): State<AppState>,
    Json(body): Json<CookieBody>,
) -> Response {
    let opts = DispatchOptions {
        cookie: body.cookie.clone(),
        ..Default::default()
    };
    let result = state
        .dispatcher
        .dispatch("/login/status", Method::POST, Some(&json!({})), &opts)
        .await;
    relay_response(&state, "failed to check login status", result)
}

/// `POST /login/refresh`: renews the forwarded session cookie.
pub(super) async fn login_refresh(
    State(state): State<AppState>,
    Json(body): Json<CookieBody>,
) -> Response {
    let result = async {
        require(&body.cookie, "cookie")?;
        let opts = DispatchOptions {
            cookie: body.cookie.clone(),
            ..Default::default()
        };
        state
            .dispatcher
            .dispatch("/login/refresh", Method::POST, Some(&json!({})), &opts)
            .await
    }
    .await;
    relay_response(&state, "failed to refresh login", result)
}

/// `GET /user/playlist`: playlists owned by an account.
pub(super) async fn user_playlist(
    State(state): State<AppState>,
    Query(query): Query<UserPlaylistQuery>,
) -> Response {
    let result = async {
        let uid = require(&query.uid, "uid")?;
        let opts = DispatchOptions {
            cookie: query.cookie.clone(),
            query: vec![("uid".to_string(), uid.to_string())],
            ..Default::default()
        };
        dispatch_with_retry(&state.dispatcher, "/user/playlist", Method::GET, None, &opts).await
    }
    .await;
    relay_response(&state, "failed to fetch user playlists", result)
}

/// `GET /playlist/detail`: full track listing of one playlist.
pub(super) async fn playlist_detail(
    State(state): State<AppState>,
    Query(query): Query<PlaylistDetailQuery>,
) -> Response {
    let result = async {
        let id = require(&query.id, "id")?;
        let opts = DispatchOptions {
            cookie: query.cookie.clone(),
            query: vec![("id".to_string(), id.to_string())],
            ..Default::default()
        };
        dispatch_with_retry(
            &state.dispatcher,
            "/playlist/detail",
            Method::GET,
            None,
            &opts,
        )
        .await
    }
    .await;
    relay_response(&state, "failed to fetch playlist detail", result)
}

/// `GET /song/url`: playable stream URL for one track.
pub(super) async fn song_url(
    State(state): State<AppState>,
    Query(query): Query<SongUrlQuery>,
) -> Response {
    let result = async {
        let id = require(&query.id, "id")?;
        let br = non_blank(&query.br).unwrap_or(DEFAULT_SONG_BITRATE);
        let opts = DispatchOptions {
            cookie: query.cookie.clone(),
            query: vec![
                ("id".to_string(), id.to_string()),
                ("br".to_string(), br.to_string()),
            ],
            ..Default::default()
        };
        dispatch_with_retry(&state.dispatcher, "/song/url", Method::GET, None, &opts).await
    }
    .await;
    relay_response(&state, "failed to fetch song url", result)
}

/// `GET /song/detail`: metadata for one or more tracks.
pub(super) async fn song_detail(
    State(state): State<AppState>,
    Query(query): Query<SongDetailQuery>,
) -> Response {
    let result = async {
        let ids = require(&query.ids, "ids")?;
        let opts = DispatchOptions {
            cookie: query.cookie.clone(),
            query: vec![("ids".to_string(), ids.to_string())],
            ..Default::default()
        };
        dispatch_with_retry(&state.dispatcher, "/song/detail", Method::GET, None, &opts).await
    }
    .await;
    relay_response(&state, "failed to fetch song detail", result)
}

/// `GET /search`: single-track search.
pub(super) async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let result = async {
        let keywords = require(&query.keywords, "keywords")?;
        let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let offset = query.offset.unwrap_or(DEFAULT_SEARCH_OFFSET);
        let opts = DispatchOptions {
            cookie: query.cookie.clone(),
            query: vec![
                ("keywords".to_string(), keywords.to_string()),
                ("limit".to_string(), limit.to_string()),
                ("offset".to_string(), offset.to_string()),
                ("type".to_string(), SEARCH_TYPE_SONG.to_string()),
            ],
            ..Default::default()
        };
        dispatch_with_retry(&state.dispatcher, "/search", Method::GET, None, &opts).await
    }
    .await;
    relay_response(&state, "search failed", result)
}

/// Last few digits of a phone number, for log lines that must not leak
/// the full account identifier.
fn tail(phone: &str) -> &str {
    let cut = phone
        .char_indices()
        .rev()
        .nth(3)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &phone[cut..]
}
