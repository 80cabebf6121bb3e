// Shared test helpers for spinning up in-process mock mirrors and relay
// instances.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::RawQuery;
use axum::http::StatusCode;
use axum::{Json, Router};
use serde_json::Value;

use music_relay::health::ProxyPool;
use music_relay::{AppState, DispatcherState};

/// Spawns a mock mirror answering every path with the given status and
/// body. Returns its base URL and a counter of received requests.
#[allow(dead_code)] // Used by other test files
pub async fn spawn_mirror(status: StatusCode, body: Value) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let handler_hits = Arc::clone(&hits);
    let app = Router::new().fallback(move || {
        let body = body.clone();
        let hits = Arc::clone(&handler_hits);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            (status, Json(body))
        }
    });
    (serve(app).await, hits)
}

/// Spawns a mock mirror that records the raw query string of the last
/// request it saw.
#[allow(dead_code)] // Used by other test files
pub async fn spawn_recording_mirror(body: Value) -> (String, Arc<Mutex<Option<String>>>) {
    let seen = Arc::new(Mutex::new(None));
    let handler_seen = Arc::clone(&seen);
    let app = Router::new().fallback(move |RawQuery(query): RawQuery| {
        let body = body.clone();
        let seen = Arc::clone(&handler_seen);
        async move {
            *seen.lock().expect("query lock") = query;
            Json(body)
        }
    });
    (serve(app).await, seen)
}

/// A URL nothing is listening on; connections to it are refused.
#[allow(dead_code)] // Used by other test files
pub async fn refused_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind throwaway listener");
    let addr = listener.local_addr().expect("throwaway addr");
    drop(listener);
    format!("http://{addr}")
}

/// Dispatcher state over the given mirrors with a short attempt timeout.
#[allow(dead_code)] // Used by other test files
pub fn dispatcher_state(endpoints: Vec<String>, proxies: &[String]) -> DispatcherState {
    let pool = ProxyPool::new(proxies).expect("valid proxy urls");
    DispatcherState::new(endpoints, pool, Duration::from_secs(2)).expect("dispatcher state")
}

/// Spawns a full relay over the given mirrors and returns its API base.
#[allow(dead_code)] // Used by other test files
pub async fn spawn_relay(endpoints: Vec<String>) -> String {
    let state = AppState {
        dispatcher: Arc::new(dispatcher_state(endpoints.clone(), &[])),
        endpoints: Arc::new(endpoints),
    };
    let base = serve(music_relay::router(state)).await;
    format!("{base}/api/netease")
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("test server addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    format!("http://{addr}")
}
