//! Request and response bodies for the REST API.

use insight_core::{ComponentHealth, EntityId, HealthStatus, StoreStats, Timestamp, TraitScores};
use serde::{Deserialize, Serialize};

// ============================================================================
// ANALYZE
// ============================================================================

/// Body of `POST /api/analyze`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnalyzeRequest {
    /// Profile URL or `{host}/in/{handle}` identity
    #[serde(alias = "linkedin_url")]
    pub url: String,
}

/// Query string of `POST /api/analyze`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct AnalyzeQuery {
    /// Skip the cache and rerun the full pipeline
    #[serde(default)]
    pub force_refresh: bool,
}

// ============================================================================
// CACHE
// ============================================================================

/// Response of `DELETE /api/cache/{identity}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ClearCacheResponse {
    pub identity_key: String,
    /// False when nothing was stored, or the store is unavailable
    pub removed: bool,
}

/// Response of `GET /api/profile-exists/{identity}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProfileExistsResponse {
    pub exists: bool,
    pub identity_key: String,
    /// Creation time of the latest stored analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub cached_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub profile_id: Option<EntityId>,
}

// ============================================================================
// VALIDATE URL
// ============================================================================

/// Body of `POST /api/validate-url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ValidateUrlRequest {
    #[serde(default, alias = "linkedin_url")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ValidateUrlResponse {
    pub valid: bool,
    pub original_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitized_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
}

// ============================================================================
// PROFILES
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct ListProfilesQuery {
    /// Page size, capped at 500
    pub limit: Option<usize>,
}

/// One row of `GET /api/profiles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProfileSummary {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub profile_id: EntityId,
    pub identity_key: String,
    pub trait_scores: TraitScores,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl From<&insight_core::ProfileRecord> for ProfileSummary {
    fn from(record: &insight_core::ProfileRecord) -> Self {
        Self {
            profile_id: record.profile_id,
            identity_key: record.identity_key.clone(),
            trait_scores: record.trait_scores,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProfileListResponse {
    pub profiles: Vec<ProfileSummary>,
    pub count: usize,
}

// ============================================================================
// HEALTH / ROOT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthComponents {
    pub store: ComponentHealth,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub store_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StoreStats>,
    pub components: HealthComponents,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Response of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RootResponse {
    pub message: String,
    pub version: String,
}
