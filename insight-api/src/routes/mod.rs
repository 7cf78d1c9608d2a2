//! REST API Routes Module
//!
//! Route handlers grouped by concern, plus the router that assembles them
//! with CORS, request telemetry, `/metrics` and `/openapi.json`.

pub mod analyze;
pub mod cache;
pub mod health;
pub mod profiles;

use axum::{middleware::from_fn, routing::get, Router};

use crate::config::ApiConfig;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use analyze::create_router as analyze_router;
pub use cache::create_router as cache_router;
pub use health::create_router as health_router;
pub use profiles::create_router as profiles_router;

/// Handler for /openapi.json endpoint.
#[cfg(feature = "openapi")]
async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

/// Assemble the full application router.
pub fn create_router(state: AppState, api_config: &ApiConfig) -> Router {
    let router = Router::new()
        .merge(health_router())
        .merge(analyze_router())
        .merge(cache_router())
        .merge(profiles_router())
        .route("/metrics", get(metrics_handler));

    #[cfg(feature = "openapi")]
    let router = router.route("/openapi.json", get(openapi_json));

    router
        .layer(from_fn(observability_middleware))
        .layer(api_config.cors_layer())
        .with_state(state)
}
