//! HTTP surface tests, driven through the router with `oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use insight_acquisition::ProfileAcquirer;
use insight_api::{create_router, AnalysisService, ApiConfig, AppState};
use insight_core::{AcquisitionError, AcquisitionStage, ErrorCategory, InsightConfig};
use insight_llm::AnalysisGenerator;
use insight_storage::RecordStore;
use insight_test_utils::fixtures::{self, SCENARIO_URL};
use insight_test_utils::{InMemoryRecordStore, ScriptedCompletionProvider, ScriptedProfileSource};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    source: Arc<ScriptedProfileSource>,
    store: InMemoryRecordStore,
}

fn app_with_store(store: Option<InMemoryRecordStore>) -> TestApp {
    let config = InsightConfig {
        allowed_hosts: Vec::new(),
        settle_delay: Duration::ZERO,
        ..Default::default()
    };
    let source = Arc::new(ScriptedProfileSource::new());
    let provider = Arc::new(ScriptedCompletionProvider::new());
    let acquirer = ProfileAcquirer::new(source.clone(), config.settle_delay);
    let generator = AnalysisGenerator::new(provider, 0.7, 2048);

    let shared: Option<Arc<dyn RecordStore>> = store
        .clone()
        .map(|s| Arc::new(s) as Arc<dyn RecordStore>);
    let service = AnalysisService::new(config, shared, acquirer, generator).unwrap();
    let router = create_router(AppState::new(Arc::new(service)), &ApiConfig::default());

    TestApp {
        router,
        source,
        store: store.unwrap_or_default(),
    }
}

fn app() -> TestApp {
    app_with_store(Some(InMemoryRecordStore::new()))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ============================================================================
// ANALYZE
// ============================================================================

#[tokio::test]
async fn test_analyze_then_cached() {
    let app = app();

    let (status, first) = send(
        &app.router,
        json_request(Method::POST, "/api/analyze", json!({"url": SCENARIO_URL})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cached"], false);
    assert_eq!(first["trait_scores"]["openness"], 72.0);
    assert!(first.get("cached_at").is_none());
    assert_eq!(first["analysis"]["strengths"].as_array().unwrap().len(), 3);

    let (status, second) = send(
        &app.router,
        json_request(Method::POST, "/api/analyze", json!({"linkedin_url": SCENARIO_URL})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cached"], true);
    assert!(second["cached_at"].is_string());
    assert_eq!(app.source.create_calls(), 1);
}

#[tokio::test]
async fn test_force_refresh_query() {
    let app = app();
    let uri = "/api/analyze?force_refresh=true";
    for _ in 0..2 {
        let (status, body) = send(
            &app.router,
            json_request(Method::POST, uri, json!({"url": SCENARIO_URL})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cached"], false);
    }
    assert_eq!(app.source.create_calls(), 2);
    assert_eq!(app.store.profile_count(), 1);
}

#[tokio::test]
async fn test_analyze_rejects_bad_input() {
    let app = app();

    let (status, body) = send(
        &app.router,
        json_request(Method::POST, "/api/analyze", json!({"url": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
    assert_eq!(body["retryable"], false);

    let (status, body) = send(
        &app.router,
        json_request(Method::POST, "/api/analyze", json!({"profile": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");

    assert_eq!(app.source.create_calls(), 0);
}

#[tokio::test]
async fn test_upstream_rate_limit_maps_to_429() {
    let app = app();
    app.source.set_create_result(Err(AcquisitionError::Rejected {
        stage: AcquisitionStage::Create,
        status: 429,
        category: ErrorCategory::RateLimited,
        message: "quota".to_string(),
    }));

    let (status, body) = send(
        &app.router,
        json_request(Method::POST, "/api/analyze", json!({"url": SCENARIO_URL})),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "rate_limited");
    assert_eq!(body["retryable"], true);
    assert!(body["details"]["reason"].as_str().unwrap().contains("429"));
}

#[tokio::test]
async fn test_incomplete_profile_maps_to_503() {
    let app = app();
    app.source.set_fetch_result(Ok(json!({})));

    let (status, body) = send(
        &app.router,
        json_request(Method::POST, "/api/analyze", json!({"url": SCENARIO_URL})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "processing_incomplete");
}

// ============================================================================
// CACHE / PROFILES
// ============================================================================

#[tokio::test]
async fn test_clear_cache_and_profile_exists() {
    let app = app();
    send(
        &app.router,
        json_request(Method::POST, "/api/analyze", json!({"url": SCENARIO_URL})),
    )
    .await;

    let (status, body) = send(&app.router, get("/api/profile-exists/acme.example/in/jdoe")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exists"], true);
    assert_eq!(body["identity_key"], fixtures::SCENARIO_IDENTITY);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/cache/acme.example/in/jdoe")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], true);

    let (_, body) = send(&app.router, get("/api/profile-exists/acme.example/in/jdoe")).await;
    assert_eq!(body["exists"], false);
    assert_eq!(app.store.profile_count(), 0);
}

#[tokio::test]
async fn test_list_profiles() {
    let app = app();
    for handle in ["a", "b"] {
        send(
            &app.router,
            json_request(
                Method::POST,
                "/api/analyze",
                json!({"url": format!("acme.example/in/{handle}")}),
            ),
        )
        .await;
    }

    let (status, body) = send(&app.router, get("/api/profiles?limit=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert!(body["profiles"][0]["trait_scores"].is_object());

    let (_, body) = send(&app.router, get("/api/profiles")).await;
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn test_validate_url() {
    let app = app();

    let (status, body) = send(
        &app.router,
        json_request(
            Method::POST,
            "/api/validate-url",
            json!({"url": "https://WWW.acme.example/in/jdoe/?x=1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["sanitized_url"], "https://acme.example/in/jdoe");

    let (status, body) = send(
        &app.router,
        json_request(Method::POST, "/api/validate-url", json!({"url": "acme.example"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert!(body["error"].is_string());

    let (status, body) = send(
        &app.router,
        json_request(Method::POST, "/api/validate-url", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

// ============================================================================
// HEALTH / OBSERVABILITY
// ============================================================================

#[tokio::test]
async fn test_health_with_store() {
    let app = app();
    let (status, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store_connected"], true);
    assert_eq!(body["stats"]["total_profiles"], 0);
}

#[tokio::test]
async fn test_health_without_store_is_degraded() {
    let app = app_with_store(None);
    let (status, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["store_connected"], false);
    assert!(body.get("stats").is_none());

    // Analysis still works, uncached.
    let (status, body) = send(
        &app.router,
        json_request(Method::POST, "/api/analyze", json!({"url": SCENARIO_URL})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], false);
}

#[tokio::test]
async fn test_root_banner() {
    let app = app();
    let (status, body) = send(&app.router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "InsightProfile API");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = app();
    send(&app.router, get("/health")).await;

    let response = app.router.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("insight_http_requests_total"));
}

#[cfg(feature = "openapi")]
#[tokio::test]
async fn test_openapi_document() {
    let app = app();
    let (status, body) = send(&app.router, get("/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/analyze"].is_object());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = app();
    let response = app.router.clone().oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
