//! Router-level tests for the observability and admin surface.

use std::sync::Arc;

use api_rotation::config::Settings;
use api_rotation::server::{routes::create_router, AppState};
use api_rotation::services::rotation::{ManualClock, ProviderFailure};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

use common::{credential, manager_with};

fn app(admin_key: Option<&str>) -> (Router, AppState) {
    let (router, state, _) = app_with_clock(admin_key);
    (router, state)
}

fn app_with_clock(admin_key: Option<&str>) -> (Router, AppState, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    let manager = manager_with(
        clock.clone(),
        vec![
            credential("qwen", "qwen_1", 100),
            credential("qwen", "qwen_2", 100),
            credential("gemini", "gemini_1", 60),
        ],
    );
    let settings = Settings {
        admin_api_key: admin_key.map(str::to_string),
        ..Settings::default()
    };
    let state = AppState::new(settings, Arc::new(manager));
    (create_router(state.clone()), state, clock)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_and_liveness() {
    let (router, _) = app(None);

    let response = router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-trace-id"));
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "development");

    let response = router
        .oneshot(Request::get("/liveness").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({ "alive": true }));
}

#[tokio::test]
async fn test_trace_id_is_echoed() {
    let (router, _) = app(None);
    let response = router
        .oneshot(
            Request::get("/liveness")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-trace-id"], "req-42");
    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_status_report_hides_secrets() {
    let (router, state) = app(None);
    let handle = state.manager.select("qwen").unwrap();
    state
        .manager
        .report_failure(&handle, &ProviderFailure::from_status(429, "rate limit"));

    let response = router
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let qwen = &body["services"]["qwen"];
    assert_eq!(qwen["total_apis"], 2);
    assert_eq!(qwen["rate_limited"], 1);
    assert_eq!(qwen["apis"][0]["cooldown_reason"], "rate_limited");
    assert_eq!(body["services"]["tavily"]["summary"]["health_status"], "degraded");
    assert!(!body.to_string().contains(&handle.secret));
}

#[tokio::test]
async fn test_metrics_exposition() {
    let (router, state) = app(None);
    state.manager.select("gemini").unwrap();

    let response = router
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("api_rotation_signals_total"));
    assert!(text.contains("signal=\"credential_selected\""));
}

#[tokio::test]
async fn test_admin_requires_key_when_configured() {
    let (router, _) = app(Some("admin-secret"));

    let response = router
        .clone()
        .oneshot(post_json("/admin/errors/reset", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = post_json("/admin/errors/reset", json!({ "service": "qwen" }));
    request
        .headers_mut()
        .insert("authorization", "Bearer admin-secret".parse().unwrap());
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ok"], true);
}

#[tokio::test]
async fn test_admin_cooldown_reset_and_bad_index() {
    let (router, state) = app(None);
    let handle = state.manager.select("gemini").unwrap();
    state
        .manager
        .report_failure(&handle, &ProviderFailure::from_status(402, "payment required"));
    assert!(!state.manager.has_available("gemini"));

    let response = router
        .clone()
        .oneshot(post_json(
            "/admin/cooldowns/reset",
            json!({ "service": "gemini", "index": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.manager.has_available("gemini"));

    let response = router
        .clone()
        .oneshot(post_json(
            "/admin/cooldowns/reset",
            json!({ "service": "gemini", "index": 5 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "invalid_request_error");

    let response = router
        .oneshot(post_json("/admin/cooldowns/reset", json!({ "index": 0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_admin_body_changes_nothing() {
    let (router, state) = app(None);
    for service in ["qwen", "gemini"] {
        while let Some(handle) = state.manager.select(service) {
            state
                .manager
                .report_failure(&handle, &ProviderFailure::from_status(402, "payment required"));
        }
        assert!(!state.manager.has_available(service));
    }

    let bodies = [
        r#"{"service":"gemini","index":"0"}"#,
        r#"{"servce":"gemini"}"#,
        r#"{"service":"gemini","#,
    ];
    for body in bodies {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin/cooldowns/reset")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
    }
    assert!(!state.manager.has_available("qwen"));
    assert!(!state.manager.has_available("gemini"));

    let response = router
        .oneshot(
            Request::post("/admin/errors/reset")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_admin_body_resets_everything() {
    let (router, state) = app(None);
    for service in ["qwen", "gemini"] {
        while let Some(handle) = state.manager.select(service) {
            state
                .manager
                .report_failure(&handle, &ProviderFailure::from_status(402, "payment required"));
        }
    }

    let response = router
        .oneshot(Request::post("/admin/cooldowns/reset").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.manager.has_available("qwen"));
    assert!(state.manager.has_available("gemini"));
}

#[tokio::test]
async fn test_admin_forced_sweep() {
    let (router, state, clock) = app_with_clock(None);
    let handle = state.manager.select("gemini").unwrap();
    state
        .manager
        .report_failure(&handle, &ProviderFailure::message("upstream timeout"));
    clock.advance(Duration::minutes(1));
    assert_eq!(state.manager.service_report("gemini").unwrap().rate_limited, 1);

    let response = router
        .clone()
        .oneshot(post_json("/admin/health/sweep", json!({ "service": "gemini" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = state.manager.service_report("gemini").unwrap();
    assert_eq!(report.active, 1);
    assert_eq!(report.rate_limited, 0);

    let response = router
        .oneshot(post_json("/admin/health/sweep", json!({ "service": "nope" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_offline_online() {
    let (router, state) = app(None);

    let response = router
        .clone()
        .oneshot(post_json(
            "/admin/credentials/offline",
            json!({ "service": "gemini", "index": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.manager.select("gemini").is_none());

    let response = router
        .clone()
        .oneshot(post_json(
            "/admin/credentials/online",
            json!({ "service": "gemini", "index": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.manager.select("gemini").is_some());

    let response = router
        .oneshot(post_json(
            "/admin/credentials/offline",
            json!({ "service": "nope", "index": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
