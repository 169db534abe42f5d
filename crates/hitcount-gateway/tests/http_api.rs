#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures_util::StreamExt;
use serde_json::Value;
use tower::ServiceExt;

use hitcount_gateway::app_state::AppState;
use hitcount_gateway::config::GatewayConfig;
use hitcount_gateway::router::build_router;
use hitcount_gateway::store::MemoryStore;

fn app_with(cfg: GatewayConfig) -> Router {
    let state = AppState::with_stores(
        cfg,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();
    build_router(state)
}

fn app() -> Router {
    app_with(GatewayConfig::default())
}

async fn send(app: &Router, method: &str, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let res = app.clone().oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn create(app: &Router, path: &str) -> String {
    let (status, body) = send(app, "POST", &format!("/create/{path}"), None).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["admin_key"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn create_hit_get() {
    let app = app();

    let (status, body) = send(&app, "POST", "/create/test/key?initializer=5", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["namespace"], "test");
    assert_eq!(body["key"], "key");
    assert_eq!(body["value"], 5);
    assert_eq!(body["admin_key"].as_str().unwrap().len(), 32);

    let (status, body) = send(&app, "GET", "/hit/test/key", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "value": 6 }));

    // identifiers are case-insensitive
    let (_, body) = send(&app, "GET", "/get/TEST/Key", None).await;
    assert_eq!(body["value"], 6);
}

#[tokio::test]
async fn keys_may_contain_slashes() {
    let app = app();

    let (status, _) = send(&app, "GET", "/hit/blog/posts/2024/hello", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/info/blog/posts/2024/hello", None).await;
    assert_eq!(body["key"], "posts/2024/hello");
    assert_eq!(body["exists"], true);
    assert_eq!(body["value"], 1);
}

#[tokio::test]
async fn random_create_uses_default_namespace() {
    let app = app();

    let (status, body) = send(&app, "GET", "/create", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["namespace"], "default");
    let key = body["key"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", &format!("/get/default/{key}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], 0);
}

#[tokio::test]
async fn error_statuses() {
    let app = app();
    create(&app, "test/dup").await;

    let (status, body) = send(&app, "GET", "/get/ab/key", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");

    let (status, body) = send(&app, "GET", "/get/test/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");

    let (status, body) = send(&app, "POST", "/create/test/dup", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "ALREADY_EXISTS");

    let (status, _) = send(&app, "POST", "/create/test/zero?ttl=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/info/test/missing", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn mutations_require_the_admin_key() {
    let app = app();
    let admin = create(&app, "test/admin").await;

    let (status, body) = send(&app, "POST", "/set/test/admin?value=10", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "AUTH_FAILED");

    let (status, _) = send(&app, "POST", "/set/test/admin?value=10", Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, "POST", "/set/test/admin?value=10", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], 10);

    let (_, body) = send(&app, "POST", "/update/test/admin?value=-3", Some(&admin)).await;
    assert_eq!(body["value"], 7);

    let (status, _) = send(&app, "POST", "/update/test/admin", Some(&admin)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "POST", "/reset/test/admin", Some(&admin)).await;
    assert_eq!(body["value"], 0);

    let (status, body) = send(&app, "POST", "/delete/test/admin", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = send(&app, "GET", "/get/test/admin", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn implicitly_created_counters_cannot_be_mutated() {
    let app = app();
    send(&app, "GET", "/hit/test/anon", None).await;

    let (status, _) = send(&app, "POST", "/reset/test/anon", Some("anything")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rate_limit_applies_to_counter_routes_only() {
    let mut cfg = GatewayConfig::default();
    cfg.rate_limit.enabled = true;
    cfg.rate_limit.budget = 2;
    cfg.rate_limit.window_secs = 60;
    let app = app_with(cfg);

    let res = app
        .clone()
        .oneshot(Request::get("/hit/test/limited").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "1");

    send(&app, "GET", "/hit/test/limited", None).await;

    let res = app
        .clone()
        .oneshot(Request::get("/hit/test/limited").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = res.headers()[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));

    let (status, body) = send(&app, "GET", "/get/test/limited", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "RATE_LIMITED");

    let (status, _) = send(&app, "GET", "/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn ops_endpoints() {
    let app = app();
    send(&app, "GET", "/hit/test/ops", None).await;
    send(&app, "GET", "/hit/test/ops", None).await;

    let (status, body) = send(&app, "GET", "/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["uptime"].is_string());

    let (status, body) = send(&app, "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requests_by_route"]["hit"], 2);
    assert_eq!(body["db_keys"], 1);
    assert_eq!(body["instance"], "local");

    let (status, _) = send(&app, "GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);

    let res = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let text = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(text.to_vec()).unwrap();
    assert!(text.contains("hitcount_counter_ops_total{op=\"hit\",outcome=\"ok\"} 2"));
    assert!(text.contains("hitcount_db_keys 1"));
}

#[tokio::test]
async fn unknown_paths_redirect_to_docs() {
    let app = app();
    for path in ["/docs", "/", "/no/such/route"] {
        let res = app
            .clone()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::PERMANENT_REDIRECT, "{path}");
        assert_eq!(res.headers()[header::LOCATION], "https://example.invalid/docs");
    }
}

#[tokio::test]
async fn stream_starts_with_current_value() {
    let app = app();
    create(&app, "test/live").await;
    send(&app, "GET", "/hit/test/live", None).await;

    let res = app
        .clone()
        .oneshot(Request::get("/stream/test/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut body = res.into_body().into_data_stream();
    let frame = body.next().await.unwrap().unwrap();
    assert_eq!(std::str::from_utf8(&frame).unwrap(), "data: {\"value\":1}\n\n");

    let (status, _) = send(&app, "GET", "/stream/test/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
