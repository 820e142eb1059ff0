//! HTTP surface tests
//!
//! Exercise the full router (middleware included) with `tower::ServiceExt`
//! against scripted downstream services.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use pulse_api::{create_router, AppState, Orchestrator};
use pulse_core::{AuthError, DownstreamResult, Role};
use pulse_test_utils::{fixtures, FakeDownstreams, FakeIdentityResolver};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

fn app(fakes: &FakeDownstreams, resolver: FakeIdentityResolver) -> Router {
    let orchestrator = Orchestrator::builder()
        .downstreams(fakes.downstreams())
        .identity_resolver(Arc::new(resolver))
        .build()
        .unwrap();
    create_router(AppState::new(Arc::new(orchestrator)))
}

fn developer_app() -> (Uuid, FakeDownstreams, Router) {
    let user_id = Uuid::now_v7();
    let fakes = FakeDownstreams::healthy(user_id);
    let router = app(
        &fakes,
        FakeIdentityResolver::resolving(fixtures::identity(user_id, Role::Developer)),
    );
    (user_id, fakes, router)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", "abc123")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_dashboard_returns_sections_with_status() {
    let (user_id, fakes, router) = developer_app();
    fakes.moods.moods_for_user.set_fallback(DownstreamResult::TimedOut);

    let response = router.oneshot(get("/api/v1/dashboard")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["summary"]["user_id"], user_id.to_string());
    assert_eq!(body["sections"]["tasks"]["status"]["state"], "fulfilled");
    assert_eq!(body["sections"]["tasks"]["data"].as_array().unwrap().len(), 3);
    assert_eq!(body["sections"]["moods"]["status"]["state"], "degraded");
    assert_eq!(body["sections"]["moods"]["status"]["reason"], "timed_out");
    assert_eq!(body["sections"]["moods"]["data"], serde_json::json!([]));
    assert!(body["sections"].get("team").is_none());
    assert_eq!(body["diagnostics"][0]["section"], "moods");
}

#[tokio::test]
async fn test_dashboard_identity_failure_is_401() {
    let fakes = FakeDownstreams::healthy(Uuid::now_v7());
    let router = app(
        &fakes,
        FakeIdentityResolver::failing(AuthError::InvalidCredential {
            reason: "Token signature is invalid".to_string(),
        }),
    );

    let response = router.oneshot(get("/api/v1/dashboard")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], "IDENTITY_UNRESOLVED");
    assert_eq!(fakes.total_calls(), 0);
}

#[tokio::test]
async fn test_expired_token_is_token_expired() {
    let fakes = FakeDownstreams::healthy(Uuid::now_v7());
    let router = app(&fakes, FakeIdentityResolver::failing(AuthError::Expired));

    let response = router.oneshot(get("/api/v1/dashboard")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn test_bust_cache_is_204() {
    let (_, fakes, router) = developer_app();

    let response = router.clone().oneshot(get("/api/v1/dashboard")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bust = Request::builder()
        .method("DELETE")
        .uri("/api/v1/dashboard/cache")
        .header("authorization", "abc123")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(bust).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    router.oneshot(get("/api/v1/dashboard")).await.unwrap();
    assert_eq!(fakes.tasks.tasks_for_user.calls(), 2);
}

fn post_task(body: Value, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/tasks")
        .header("authorization", "Bearer abc123")
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("idempotency-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_create_task_is_201_and_forwards_key() {
    let (_, fakes, router) = developer_app();

    let response = router
        .oneshot(post_task(
            serde_json::json!({ "title": "write docs", "priority": "high" }),
            Some("create-9"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["title"], "created");
    assert_eq!(
        fakes.tasks.create_task.last_args(),
        vec!["write docs".to_string(), "create-9".to_string()]
    );
    assert_eq!(
        fakes.tasks.create_task.last_credential().as_deref(),
        Some("Bearer abc123")
    );
}

#[tokio::test]
async fn test_create_task_failures_map_to_status() {
    let cases = [
        (DownstreamResult::transport("task-service returned 500"), StatusCode::BAD_GATEWAY),
        (DownstreamResult::decode("missing field id"), StatusCode::BAD_GATEWAY),
        (DownstreamResult::TimedOut, StatusCode::GATEWAY_TIMEOUT),
        (DownstreamResult::invalid_input("bad assignee"), StatusCode::BAD_REQUEST),
    ];

    for (failure, expected) in cases {
        let (_, fakes, router) = developer_app();
        fakes.tasks.create_task.set_fallback(failure);

        let response = router
            .oneshot(post_task(serde_json::json!({ "title": "x" }), None))
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }
}

#[tokio::test]
async fn test_create_task_rejects_blank_title() {
    let (_, fakes, router) = developer_app();
    let response = router
        .oneshot(post_task(serde_json::json!({ "title": "  " }), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fakes.tasks.create_task.calls(), 0);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let (_, _, router) = developer_app();

    let ping = router
        .clone()
        .oneshot(Request::builder().uri("/health/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(ping.status(), StatusCode::OK);

    let live = router
        .clone()
        .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(live.status(), StatusCode::OK);
    assert_eq!(json_body(live).await["status"], "healthy");

    router.clone().oneshot(get("/api/v1/dashboard")).await.unwrap();
    let metrics = router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(metrics.status(), StatusCode::OK);
    let bytes = to_bytes(metrics.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("pulse_dashboard_sections_total"));
    assert!(text.contains("pulse_cache_lookups_total"));
}
