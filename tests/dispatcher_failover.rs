// Failover behavior of one logical dispatch across mock mirrors.

mod helpers;

use axum::http::StatusCode;
use reqwest::Method;
use serde_json::json;
use std::sync::atomic::Ordering;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use music_relay::config::{RISK_CONTROL_MESSAGE, RISK_CONTROL_SUGGESTION};
use music_relay::{DispatchOptions, RelayError};

use helpers::{dispatcher_state, refused_endpoint, spawn_mirror};

#[tokio::test]
async fn risk_rejections_fail_over_to_healthy_mirror() {
    let (a, a_hits) = spawn_mirror(StatusCode::OK, json!({"code": 8810})).await;
    let (b, b_hits) = spawn_mirror(StatusCode::OK, json!({"code": 8810})).await;
    let (c, c_hits) = spawn_mirror(StatusCode::OK, json!({"code": 200, "data": "ok"})).await;
    let state = dispatcher_state(vec![a, b, c], &[]);

    let body = state
        .dispatch("/song/url", Method::GET, None, &DispatchOptions::default())
        .await
        .expect("third mirror answers");
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"], "ok");

    let snapshot = state.health.lock().await.snapshot(Instant::now());
    assert_eq!(snapshot[0].1.error_count, 1);
    assert_eq!(snapshot[1].1.error_count, 1);
    assert_eq!(snapshot[2].1.error_count, 0);
    assert_eq!(a_hits.load(Ordering::SeqCst), 1);
    assert_eq!(b_hits.load(Ordering::SeqCst), 1);
    assert_eq!(c_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn all_risk_rejections_surface_normalized_error() {
    let (a, _) = spawn_mirror(StatusCode::OK, json!({"code": 8810, "message": "blocked"})).await;
    let (b, _) = spawn_mirror(StatusCode::OK, json!({"code": 8810})).await;
    let (c, _) = spawn_mirror(StatusCode::OK, json!({"code": 8810})).await;
    let state = dispatcher_state(vec![a, b, c], &[]);

    let error = state
        .dispatch("/search", Method::GET, None, &DispatchOptions::default())
        .await
        .expect_err("every mirror rejects");
    match error {
        RelayError::RiskDetected {
            message,
            suggestion,
            ..
        } => {
            assert_eq!(message, RISK_CONTROL_MESSAGE);
            assert_eq!(suggestion, RISK_CONTROL_SUGGESTION);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let snapshot = state.health.lock().await.snapshot(Instant::now());
    for (_, record) in snapshot {
        assert_eq!(record.error_count, 1);
    }
}

#[tokio::test]
async fn transport_failure_fails_over_to_next_mirror() {
    let a = refused_endpoint().await;
    let (b, _) = spawn_mirror(StatusCode::OK, json!({"code": 200})).await;
    let state = dispatcher_state(vec![a, b], &[]);

    let body = state
        .dispatch("/login/status", Method::POST, Some(&json!({})), &DispatchOptions::default())
        .await
        .expect("backup answers");
    assert_eq!(body["code"], 200);

    let snapshot = state.health.lock().await.snapshot(Instant::now());
    assert_eq!(snapshot[0].1.error_count, 1);
    // success resets the backup's streak
    assert_eq!(snapshot[1].1.error_count, 0);
    assert!(snapshot[1].1.available);
}

#[tokio::test]
async fn no_available_endpoints_fails_fast() {
    let (a, a_hits) = spawn_mirror(StatusCode::OK, json!({"code": 200})).await;
    let state = dispatcher_state(vec![a.clone()], &[]);
    {
        let mut health = state.health.lock().await;
        let now = Instant::now();
        for _ in 0..3 {
            health.record_failure(&a, now);
        }
    }

    let error = state
        .dispatch("/song/detail", Method::GET, None, &DispatchOptions::default())
        .await
        .expect_err("nothing to try");
    assert!(matches!(error, RelayError::AllEndpointsUnavailable));
    // no network call was attempted
    assert_eq!(a_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancelled_dispatch_leaves_no_health_marks() {
    let (a, a_hits) = spawn_mirror(StatusCode::OK, json!({"code": 200})).await;
    let state = dispatcher_state(vec![a], &[]);

    let token = CancellationToken::new();
    token.cancel();
    let opts = DispatchOptions {
        cancel: Some(token),
        ..Default::default()
    };

    let error = state
        .dispatch("/search", Method::GET, None, &opts)
        .await
        .expect_err("cancelled before any work");
    assert!(matches!(error, RelayError::Cancelled));

    let snapshot = state.health.lock().await.snapshot(Instant::now());
    assert_eq!(snapshot[0].1.error_count, 0);
    assert_eq!(a_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn proxy_escalation_starts_at_second_attempt() {
    let (a, _) = spawn_mirror(StatusCode::OK, json!({"code": 8810})).await;
    let (b, _) = spawn_mirror(StatusCode::OK, json!({"code": 200})).await;
    let (c, _) = spawn_mirror(StatusCode::OK, json!({"code": 200})).await;
    // nothing listens on the proxy address, so proxied attempts fail
    let proxy = refused_endpoint().await;
    let state = dispatcher_state(vec![a.clone(), b.clone(), c.clone()], &[proxy.clone()]);

    let error = state
        .dispatch("/song/url", Method::GET, None, &DispatchOptions::default())
        .await
        .expect_err("escalated attempts cannot reach their mirrors");
    assert!(matches!(error, RelayError::Transport { .. }));

    // first attempt was direct, second and third went through the proxy
    let proxy_url = Url::parse(&proxy).expect("proxy url");
    let proxies = state.proxies.lock().await;
    assert_eq!(proxies.error_count(&proxy_url), 2);

    let snapshot = state.health.lock().await.snapshot(Instant::now());
    for (_, record) in snapshot {
        assert_eq!(record.error_count, 1);
    }
}
