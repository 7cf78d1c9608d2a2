//! Profile listing and URL validation.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::{get, post},
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::services::AnalysisService;
use crate::state::AppState;
use crate::types::{ListProfilesQuery, ProfileListResponse, ValidateUrlRequest, ValidateUrlResponse};

/// GET /api/profiles - List stored profiles, newest first
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/profiles",
    tag = "Profiles",
    params(ListProfilesQuery),
    responses(
        (status = 200, description = "Stored profiles", body = ProfileListResponse),
    ),
))]
pub async fn list_profiles(
    State(service): State<Arc<AnalysisService>>,
    Query(query): Query<ListProfilesQuery>,
) -> ApiResult<Json<ProfileListResponse>> {
    let profiles = service.list_profiles(query.limit).await?;
    Ok(Json(ProfileListResponse {
        count: profiles.len(),
        profiles,
    }))
}

/// POST /api/validate-url - Check a profile URL without analyzing it
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/api/validate-url",
    tag = "Profiles",
    request_body = ValidateUrlRequest,
    responses(
        (status = 200, description = "Validation result", body = ValidateUrlResponse),
        (status = 400, description = "URL missing", body = ApiError),
    ),
))]
pub async fn validate_url(
    State(service): State<Arc<AnalysisService>>,
    body: Result<Json<ValidateUrlRequest>, JsonRejection>,
) -> ApiResult<Json<ValidateUrlResponse>> {
    let Json(req) = body.map_err(|e| ApiError::invalid_input(e.body_text()))?;
    Ok(Json(service.validate_url(req.url.as_deref())?))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/profiles", get(list_profiles))
        .route("/api/validate-url", post(validate_url))
}
