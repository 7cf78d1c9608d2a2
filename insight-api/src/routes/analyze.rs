//! Analyze Endpoint
//!
//! `POST /api/analyze` runs the cache-aside pipeline for one profile.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::post,
    Json, Router,
};
use insight_core::AnalysisResponse;

use crate::error::{ApiError, ApiResult};
use crate::services::AnalysisService;
use crate::state::AppState;
use crate::types::{AnalyzeQuery, AnalyzeRequest};

/// POST /api/analyze - Analyze a profile
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/analyze",
    tag = "Analysis",
    params(AnalyzeQuery),
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis, cached or freshly computed", body = AnalysisResponse),
        (status = 400, description = "Invalid profile URL", body = ApiError),
        (status = 429, description = "Upstream rate limited", body = ApiError),
        (status = 502, description = "Upstream failure", body = ApiError),
        (status = 503, description = "Upstream temporarily unavailable", body = ApiError),
        (status = 504, description = "Analysis timed out", body = ApiError),
    ),
))]
pub async fn analyze(
    State(service): State<Arc<AnalysisService>>,
    Query(query): Query<AnalyzeQuery>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<AnalysisResponse>> {
    let Json(req) = body.map_err(|e| ApiError::invalid_input(e.body_text()))?;
    let response = service.analyze(&req.url, query.force_refresh).await?;
    Ok(Json(response))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/api/analyze", post(analyze))
}
