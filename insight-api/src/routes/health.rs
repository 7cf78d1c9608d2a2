//! Health and root endpoints.
//!
//! A missing or unreachable store reports `degraded` with status 200: the
//! service keeps answering analyze calls without a cache.

use axum::{extract::State, routing::get, Json, Router};
use insight_core::HealthStatus;

use crate::state::AppState;
use crate::types::{HealthComponents, HealthResponse, RootResponse};

/// GET /health - Store connectivity and statistics
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse),
    ),
))]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = state.service.health().await;
    let status = if report.store_connected {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    Json(HealthResponse {
        status,
        store_connected: report.store_connected,
        stats: report.stats,
        components: HealthComponents {
            store: report.store,
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// GET / - Service banner
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses(
        (status = 200, description = "Service banner", body = RootResponse),
    ),
))]
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "InsightProfile API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}
