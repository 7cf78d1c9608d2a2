//! API Configuration Module
//!
//! CORS settings for the HTTP surface. Pipeline settings live in
//! `insight_core::InsightConfig`.

use axum::http::{HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Default preflight cache duration (24 hours).
const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86_400;

/// HTTP layer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `INSIGHT_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `INSIGHT_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `INSIGHT_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("INSIGHT_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("INSIGHT_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("INSIGHT_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CORS_MAX_AGE_SECS);

        Self {
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
        }
    }

    /// True when an explicit origin list is configured.
    pub fn is_restricted(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Build the CORS layer.
    ///
    /// With no origins configured any origin is allowed and credentials are
    /// never sent, since browsers reject `*` combined with credentials.
    pub fn cors_layer(&self) -> CorsLayer {
        let base = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT])
            .max_age(Duration::from_secs(self.cors_max_age_secs));

        if !self.is_restricted() {
            return base.allow_origin(Any);
        }

        let origins: Vec<HeaderValue> = self
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        base.allow_origin(AllowOrigin::list(origins))
            .allow_credentials(self.cors_allow_credentials)
    }
}
