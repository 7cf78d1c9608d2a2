//! OpenAPI Specification for the InsightProfile API
//!
//! Generated from the route annotations and schema derives with utoipa and
//! served at `/openapi.json`.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::{analyze, cache, health, profiles};
use crate::telemetry::metrics;
use crate::types::{
    AnalyzeRequest, ClearCacheResponse, HealthComponents, HealthResponse, ProfileExistsResponse,
    ProfileListResponse, ProfileSummary, RootResponse, ValidateUrlRequest, ValidateUrlResponse,
};
use insight_core::{
    AnalysisBody, AnalysisResponse, ComponentHealth, HealthStatus, StoreStats, TraitScores,
};

/// OpenAPI document for the InsightProfile API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "InsightProfile API",
        version = "0.4.0",
        description = "Behavioral profile acquisition and cached personality analysis",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    servers(
        (url = "http://localhost:8000", description = "Local Development")
    ),
    tags(
        (name = "Analysis", description = "Cache-aside profile analysis"),
        (name = "Cache", description = "Stored profile management"),
        (name = "Profiles", description = "Listing and URL validation"),
        (name = "Health", description = "Liveness and store connectivity"),
        (name = "Observability", description = "Prometheus metrics"),
    ),
    paths(
        analyze::analyze,
        cache::clear_cache,
        cache::profile_exists,
        profiles::list_profiles,
        profiles::validate_url,
        health::health,
        health::root,
        metrics::metrics_handler,
    ),
    components(schemas(
        ApiError,
        ErrorCode,
        AnalyzeRequest,
        AnalysisResponse,
        AnalysisBody,
        TraitScores,
        ClearCacheResponse,
        ProfileExistsResponse,
        ValidateUrlRequest,
        ValidateUrlResponse,
        ProfileSummary,
        ProfileListResponse,
        HealthResponse,
        HealthComponents,
        ComponentHealth,
        HealthStatus,
        StoreStats,
        RootResponse,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/analyze",
            "/api/cache/{identity}",
            "/api/profile-exists/{identity}",
            "/api/profiles",
            "/api/validate-url",
            "/health",
            "/",
            "/metrics",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn test_document_serializes() {
        let json = ApiDoc::openapi().to_json().unwrap();
        assert!(json.contains("AnalysisResponse"));
        assert!(json.contains("store_unavailable"));
    }

    #[test]
    fn test_timestamps_and_ids_are_formatted_strings() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let schemas = &doc["components"]["schemas"];

        let field = |schema: &str, name: &str| schemas[schema]["properties"][name].clone();
        assert_eq!(field("StoreStats", "generated_at")["format"], "date-time");
        assert_eq!(field("ProfileSummary", "created_at")["format"], "date-time");
        assert_eq!(field("ProfileSummary", "profile_id")["format"], "uuid");
        assert_eq!(field("AnalysisResponse", "cached_at")["format"], "date-time");
        assert_eq!(field("ProfileExistsResponse", "profile_id")["format"], "uuid");
    }
}
