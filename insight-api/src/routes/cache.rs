//! Cache Management Endpoints
//!
//! - `DELETE /api/cache/{identity}` removes a stored profile and its analyses
//! - `GET /api/profile-exists/{identity}` reports whether one is stored
//!
//! Neither endpoint triggers upstream work.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};

use crate::error::ApiResult;
#[cfg(feature = "openapi")]
use crate::error::ApiError;
use crate::services::AnalysisService;
use crate::state::AppState;
use crate::types::{ClearCacheResponse, ProfileExistsResponse};

/// DELETE /api/cache/{identity} - Clear a cached profile
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/api/cache/{identity}",
    tag = "Cache",
    params(("identity" = String, Path, description = "Profile URL or identity key")),
    responses(
        (status = 200, description = "Cache entry removed or absent", body = ClearCacheResponse),
        (status = 400, description = "Invalid profile URL", body = ApiError),
    ),
))]
pub async fn clear_cache(
    State(service): State<Arc<AnalysisService>>,
    Path(identity): Path<String>,
) -> ApiResult<Json<ClearCacheResponse>> {
    Ok(Json(service.clear_cache(&identity).await?))
}

/// GET /api/profile-exists/{identity} - Check for a stored profile
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/api/profile-exists/{identity}",
    tag = "Cache",
    params(("identity" = String, Path, description = "Profile URL or identity key")),
    responses(
        (status = 200, description = "Existence report", body = ProfileExistsResponse),
        (status = 400, description = "Invalid profile URL", body = ApiError),
    ),
))]
pub async fn profile_exists(
    State(service): State<Arc<AnalysisService>>,
    Path(identity): Path<String>,
) -> ApiResult<Json<ProfileExistsResponse>> {
    Ok(Json(service.profile_exists(&identity).await?))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/cache/*identity", delete(clear_cache))
        .route("/api/profile-exists/*identity", get(profile_exists))
}
