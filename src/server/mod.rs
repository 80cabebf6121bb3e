//! Inbound HTTP surface.
//!
//! The router nests every upstream operation under `/api/netease` and adds
//! a permissive CORS layer: the whole point of the relay is letting the
//! browser player call these APIs without tripping cross-origin checks.

mod handlers;
mod types;

use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::dispatch::DispatcherState;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The failover dispatcher and its health/rate/statistics state.
    pub dispatcher: Arc<DispatcherState>,
    /// Configured mirrors in priority order; `/test` probes the first two.
    pub endpoints: Arc<Vec<String>>,
}

/// Builds the relay router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/test", get(handlers::test_connectivity))
        .route("/status", get(handlers::relay_status))
        .route("/login/cellphone", post(handlers::login_cellphone))
        .route("/captcha/sent", post(handlers::captcha_sent))
        .route("/login/status", post(handlers::login_status))
        .route("/login/refresh", post(handlers::login_refresh))
        .route("/user/playlist", get(handlers::user_playlist))
        .route("/playlist/detail", get(handlers::playlist_detail))
        .route("/song/url", get(handlers::song_url))
        .route("/song/detail", get(handlers::song_detail))
        .route("/search", get(handlers::search));

    Router::new()
        .nest("/api/netease", api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the relay server until ctrl-c.
///
/// Builds the dispatcher state from the configuration, binds the listener
/// and serves with graceful shutdown. An error-statistics summary is
/// logged once the server drains.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let dispatcher = Arc::new(
        DispatcherState::from_config(&config).context("Failed to initialize dispatcher")?,
    );
    let state = AppState {
        dispatcher: Arc::clone(&dispatcher),
        endpoints: Arc::new(config.endpoints_or_default()),
    };
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    log::info!("music_relay listening on http://{addr}/api/netease");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    dispatcher.stats.log_summary();
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("shutdown requested"),
        Err(e) => log::warn!("failed to listen for shutdown signal: {e}"),
    }
}
