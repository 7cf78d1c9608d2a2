//! Error Types for the InsightProfile API
//!
//! - `ErrorCode`: the stable tag clients branch on, one per pipeline
//!   category plus a few request-level codes
//! - `ApiError`: the JSON error body, with `IntoResponse`
//!
//! Every error is serialized as JSON with a matching HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use insight_core::{ConfigError, ErrorCategory, InsightError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Stable error tags returned to clients.
///
/// Pipeline codes serialize to the same tag as their [`ErrorCategory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // ========================================================================
    // Caller errors (400, 404)
    // ========================================================================
    /// The identity or request body is malformed
    InvalidInput,

    /// Required field is missing from the request
    MissingField,

    /// No cached record for the identity
    NotFound,

    // ========================================================================
    // Try again later (429, 503, 504)
    // ========================================================================
    RateLimited,
    ProcessingIncomplete,
    NetworkError,
    GenerationUnreachable,
    StoreUnavailable,
    Timeout,

    // ========================================================================
    // Degraded system (500, 502)
    // ========================================================================
    AuthFailure,
    UpstreamInternal,
    InternalError,
}

impl ErrorCode {
    /// HTTP status sent with this code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::MissingField => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::ProcessingIncomplete
            | ErrorCode::NetworkError
            | ErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::AuthFailure
            | ErrorCode::UpstreamInternal
            | ErrorCode::GenerationUnreachable => StatusCode::BAD_GATEWAY,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The pipeline category this code mirrors, if any.
    pub fn category(&self) -> Option<ErrorCategory> {
        Some(match self {
            ErrorCode::InvalidInput => ErrorCategory::InvalidInput,
            ErrorCode::RateLimited => ErrorCategory::RateLimited,
            ErrorCode::ProcessingIncomplete => ErrorCategory::ProcessingIncomplete,
            ErrorCode::NetworkError => ErrorCategory::NetworkError,
            ErrorCode::GenerationUnreachable => ErrorCategory::GenerationUnreachable,
            ErrorCode::StoreUnavailable => ErrorCategory::StoreUnavailable,
            ErrorCode::Timeout => ErrorCategory::Timeout,
            ErrorCode::AuthFailure => ErrorCategory::AuthFailure,
            ErrorCode::UpstreamInternal => ErrorCategory::UpstreamInternal,
            ErrorCode::MissingField | ErrorCode::NotFound | ErrorCode::InternalError => {
                return None
            }
        })
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_some_and(|c| c.is_retryable())
    }
}

impl From<ErrorCategory> for ErrorCode {
    fn from(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::InvalidInput => ErrorCode::InvalidInput,
            ErrorCategory::RateLimited => ErrorCode::RateLimited,
            ErrorCategory::ProcessingIncomplete => ErrorCode::ProcessingIncomplete,
            ErrorCategory::AuthFailure => ErrorCode::AuthFailure,
            ErrorCategory::UpstreamInternal => ErrorCode::UpstreamInternal,
            ErrorCategory::NetworkError => ErrorCode::NetworkError,
            ErrorCategory::GenerationUnreachable => ErrorCode::GenerationUnreachable,
            ErrorCategory::StoreUnavailable => ErrorCode::StoreUnavailable,
            ErrorCategory::Timeout => ErrorCode::Timeout,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category() {
            Some(category) => f.write_str(category.as_str()),
            None => match self {
                ErrorCode::MissingField => f.write_str("missing_field"),
                ErrorCode::NotFound => f.write_str("not_found"),
                _ => f.write_str("internal_error"),
            },
        }
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Stable error tag
    pub code: ErrorCode,

    /// Safe to show to end users
    pub message: String,

    /// Whether the same request may succeed later
    pub retryable: bool,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
            details: None,
        }
    }

    /// Attach a JSON object under `details`.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreUnavailable, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Pipeline errors keep their category; the message is the category's
/// user-facing text, with the underlying error in `details`.
impl From<InsightError> for ApiError {
    fn from(err: InsightError) -> Self {
        let category = err.category();
        let message = match &err {
            InsightError::Validation(e) => validation_message(e),
            _ => category.user_message().to_string(),
        };
        ApiError::new(category.into(), message)
            .with_details(serde_json::json!({ "reason": err.to_string() }))
    }
}

fn validation_message(err: &ValidationError) -> String {
    match err {
        ValidationError::RequiredFieldMissing { field } => {
            format!("Required field '{}' is missing", field)
        }
        other => other.to_string(),
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal_error(format!("Configuration error: {}", err))
    }
}

impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        ApiError::store_unavailable("Database operation failed")
    }
}

impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);
        match err {
            deadpool_postgres::PoolError::Timeout(_) => {
                ApiError::store_unavailable("Database connection pool exhausted")
            }
            deadpool_postgres::PoolError::Closed => {
                ApiError::store_unavailable("Database connection pool is closed")
            }
            _ => ApiError::store_unavailable("Failed to acquire database connection"),
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result alias for handlers and API-side helpers.
pub type ApiResult<T> = Result<T, ApiError>;
