use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use tts_quota_gate::limits::StaticLimitsProvider;
use tts_quota_gate::storage::MemoryUsageStore;
use tts_quota_gate::{
    create_router, ApiState, ConfigCache, FailureMode, LimitValues, LimitsError, LimitsProvider,
    QuotaGate, QuotaGateConfig, QuotaPolicy,
};

struct BrokenProvider;

#[async_trait]
impl LimitsProvider for BrokenProvider {
    async fn fetch_limits(&self, _fallback: &LimitValues) -> Result<LimitValues, LimitsError> {
        Err(LimitsError::Timeout)
    }
}

fn limits() -> LimitValues {
    LimitValues {
        daily_free_chars: 100,
        ..LimitValues::default()
    }
}

fn app_with(
    store: Arc<MemoryUsageStore>,
    provider: Arc<dyn LimitsProvider>,
    failure_mode: FailureMode,
) -> Router {
    let cache = Arc::new(ConfigCache::new(limits(), provider));
    let gate = Arc::new(QuotaGate::new(cache, store, QuotaPolicy::default()));
    let config = QuotaGateConfig {
        failure_mode,
        ..QuotaGateConfig::default()
    };
    create_router(Arc::new(ApiState::new(gate, config)))
}

fn app(store: Arc<MemoryUsageStore>) -> Router {
    app_with(
        store,
        Arc::new(StaticLimitsProvider::new(limits())),
        FailureMode::Closed,
    )
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("request handled");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn charge_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/quota/charge")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_charge_allowed_then_denied() {
    let store = Arc::new(MemoryUsageStore::new());

    let (status, body) = send(
        app(store.clone()),
        charge_request(json!({ "device_id": "dev-1", "requested_chars": 80 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "allowed");
    assert_eq!(body["usage"][0]["used"], 80);

    let (status, body) = send(
        app(store),
        charge_request(json!({ "device_id": "dev-1", "requested_chars": 30 })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["decision"], "denied");
    assert_eq!(body["denial"]["used"], 80);
    assert_eq!(body["denial"]["limit"], 100);
}

#[tokio::test]
async fn test_charge_defaults_to_text_byte_length() {
    let store = Arc::new(MemoryUsageStore::new());
    let (status, body) = send(
        app(store),
        charge_request(json!({ "device_id": "dev-1", "text": "günaydın" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requested_chars"], "günaydın".len());
}

#[tokio::test]
async fn test_charge_validation() {
    let store = Arc::new(MemoryUsageStore::new());

    let (status, body) = send(
        app(store.clone()),
        charge_request(json!({ "device_id": " ", "requested_chars": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_device_id");

    let (status, body) = send(
        app(store.clone()),
        charge_request(json!({ "requested_chars": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_device_id");
    assert!(store.is_empty());

    let (status, body) = send(
        app(store),
        charge_request(json!({ "device_id": "dev-1", "text": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");
}

#[tokio::test]
async fn test_subscriber_bypass() {
    let store = Arc::new(MemoryUsageStore::new());
    let (status, body) = send(
        app(store.clone()),
        charge_request(json!({ "device_id": "dev-1", "requested_chars": 5000, "tier": "subscriber" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "bypassed");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_plus_is_accepted_as_subscriber() {
    let store = Arc::new(MemoryUsageStore::new());
    let (status, body) = send(
        app(store.clone()),
        charge_request(json!({ "device_id": "dev-1", "requested_chars": 5000, "tier": "plus" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "bypassed");
    assert_eq!(body["tier"], "subscriber");

    let request = Request::builder()
        .uri("/api/quota/dev-1?tier=plus")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(store), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["tier"], "subscriber");
    assert_eq!(body["report"]["metered"], false);
}

#[tokio::test]
async fn test_zero_charge_allowed_during_store_outage() {
    let store = Arc::new(MemoryUsageStore::new());
    store.set_unavailable(true);

    let (status, body) = send(
        app(store),
        charge_request(json!({ "device_id": "dev-1", "requested_chars": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "allowed");
}

#[tokio::test]
async fn test_static_refresh_keeps_fetched_at_unset() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/limits/refresh")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(Arc::new(MemoryUsageStore::new())), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limits"]["daily_free_chars"], 100);
    assert_eq!(body["fetched_at"], Value::Null);
}

#[tokio::test]
async fn test_store_outage_fail_closed() {
    let store = Arc::new(MemoryUsageStore::new());
    store.set_unavailable(true);

    let (status, body) = send(
        app(store),
        charge_request(json!({ "device_id": "dev-1", "requested_chars": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "quota_unavailable");
}

#[tokio::test]
async fn test_store_outage_fail_open() {
    let store = Arc::new(MemoryUsageStore::new());
    store.set_unavailable(true);
    let app = app_with(
        store,
        Arc::new(StaticLimitsProvider::new(limits())),
        FailureMode::Open,
    );

    let (status, body) = send(
        app,
        charge_request(json!({ "device_id": "dev-1", "requested_chars": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "unmetered");
}

#[tokio::test]
async fn test_get_usage() {
    let store = Arc::new(MemoryUsageStore::new());
    send(
        app(store.clone()),
        charge_request(json!({ "device_id": "dev-1", "requested_chars": 42 })),
    )
    .await;

    let request = Request::builder()
        .uri("/api/quota/dev-1?tier=free")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(store), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["metered"], true);
    assert_eq!(body["report"]["windows"][0]["used"], 42);
    assert_eq!(body["limits"]["daily_free_chars"], 100);
}

#[tokio::test]
async fn test_limits_refresh_failure_returns_bad_gateway() {
    let store = Arc::new(MemoryUsageStore::new());
    let app = app_with(store, Arc::new(BrokenProvider), FailureMode::Closed);

    let request = Request::builder()
        .method("POST")
        .uri("/api/limits/refresh")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "limits_refresh_failed");

    let request = Request::builder()
        .uri("/api/limits")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["limits"]["daily_free_chars"], 100);
    assert_eq!(body["fetched_at"], Value::Null);
    assert_eq!(body["consecutive_failures"], 1);
}

#[tokio::test]
async fn test_health_check() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(Arc::new(MemoryUsageStore::new())), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["policy"], "daily-only");
    assert_eq!(body["failure_mode"], "closed");
}
