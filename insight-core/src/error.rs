//! Error types for profile acquisition, analysis and storage

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// ERROR CATEGORY
// ============================================================================

/// Stable, client-facing classification of every failure the pipeline can
/// produce.
///
/// Clients branch on the category, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The identity or request was malformed or rejected by the upstream.
    InvalidInput,
    /// Upstream quota exhausted or request rate exceeded.
    RateLimited,
    /// The upstream has not finished building the profile yet.
    ProcessingIncomplete,
    /// Credentials were refused by the upstream.
    AuthFailure,
    /// The upstream failed, or answered with something unrecognized.
    UpstreamInternal,
    /// Connection refused, reset, or the per-call deadline elapsed.
    NetworkError,
    /// The language model could not be reached.
    GenerationUnreachable,
    /// The record store is down. Absorbed by the orchestrator.
    StoreUnavailable,
    /// The overall analyze deadline elapsed.
    Timeout,
}

impl ErrorCategory {
    /// Every category, in declaration order.
    pub const ALL: [ErrorCategory; 9] = [
        ErrorCategory::InvalidInput,
        ErrorCategory::RateLimited,
        ErrorCategory::ProcessingIncomplete,
        ErrorCategory::AuthFailure,
        ErrorCategory::UpstreamInternal,
        ErrorCategory::NetworkError,
        ErrorCategory::GenerationUnreachable,
        ErrorCategory::StoreUnavailable,
        ErrorCategory::Timeout,
    ];

    /// Wire tag, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::ProcessingIncomplete => "processing_incomplete",
            ErrorCategory::AuthFailure => "auth_failure",
            ErrorCategory::UpstreamInternal => "upstream_internal",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::GenerationUnreachable => "generation_unreachable",
            ErrorCategory::StoreUnavailable => "store_unavailable",
            ErrorCategory::Timeout => "timeout",
        }
    }

    /// Human-readable message shown to callers.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidInput => {
                "The profile URL is invalid or the profile could not be found."
            }
            ErrorCategory::RateLimited => {
                "The profile service is rate limiting requests or credits are exhausted. Try again later."
            }
            ErrorCategory::ProcessingIncomplete => {
                "The profile is still being processed. Try again in a minute."
            }
            ErrorCategory::AuthFailure => "The profile service rejected the configured credentials.",
            ErrorCategory::UpstreamInternal => "The profile service failed to process the request.",
            ErrorCategory::NetworkError => "The profile service could not be reached.",
            ErrorCategory::GenerationUnreachable => "The analysis model could not be reached.",
            ErrorCategory::StoreUnavailable => "The record store is unavailable.",
            ErrorCategory::Timeout => "The analysis did not complete in time.",
        }
    }

    /// Whether the same request may succeed later without any change.
    ///
    /// `invalid_input` is the caller's fault; `auth_failure` and
    /// `upstream_internal` mean the system itself is degraded.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::RateLimited
                | ErrorCategory::ProcessingIncomplete
                | ErrorCategory::NetworkError
                | ErrorCategory::GenerationUnreachable
                | ErrorCategory::Timeout
        )
    }

    /// Categories that are logged and swallowed instead of surfaced.
    pub fn is_absorbed(&self) -> bool {
        matches!(self, ErrorCategory::StoreUnavailable)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// STORAGE
// ============================================================================

/// Record store errors. All of them classify as `store_unavailable`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Failed to decode {field}: {reason}")]
    Serialization { field: String, reason: String },

    #[error("Integrity violation: {reason}")]
    IntegrityViolation { reason: String },
}

impl StorageError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::StoreUnavailable
    }
}

// ============================================================================
// ACQUISITION
// ============================================================================

/// Which half of the two-phase upstream workflow failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionStage {
    Create,
    Fetch,
}

impl fmt::Display for AcquisitionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionStage::Create => f.write_str("create"),
            AcquisitionStage::Fetch => f.write_str("fetch"),
        }
    }
}

/// Profile upstream errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("Profile {stage} call rejected with status {status} ({category}): {message}")]
    Rejected {
        stage: AcquisitionStage,
        status: u16,
        category: ErrorCategory,
        message: String,
    },

    #[error("Profile create call returned no external id")]
    MissingExternalId,

    #[error("Profile {stage} call returned incomplete data: {reason}")]
    Incomplete {
        stage: AcquisitionStage,
        reason: String,
    },

    #[error("Network failure during profile {stage} call: {reason}")]
    Network {
        stage: AcquisitionStage,
        reason: String,
    },

    #[error("Invalid response from profile {stage} call: {reason}")]
    InvalidResponse {
        stage: AcquisitionStage,
        reason: String,
    },
}

impl AcquisitionError {
    pub fn stage(&self) -> AcquisitionStage {
        match self {
            AcquisitionError::Rejected { stage, .. }
            | AcquisitionError::Incomplete { stage, .. }
            | AcquisitionError::Network { stage, .. }
            | AcquisitionError::InvalidResponse { stage, .. } => *stage,
            AcquisitionError::MissingExternalId => AcquisitionStage::Create,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AcquisitionError::Rejected { category, .. } => *category,
            AcquisitionError::Incomplete { .. } => ErrorCategory::ProcessingIncomplete,
            AcquisitionError::Network { .. } => ErrorCategory::NetworkError,
            AcquisitionError::MissingExternalId | AcquisitionError::InvalidResponse { .. } => {
                ErrorCategory::UpstreamInternal
            }
        }
    }
}

// ============================================================================
// GENERATION
// ============================================================================

/// Language model transport errors.
///
/// Malformed model output never produces one of these; it is absorbed by
/// the parse ladder.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("No completion provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Invalid response envelope from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Could not reach {provider}: {reason}")]
    Unreachable { provider: String, reason: String },
}

impl GenerationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GenerationError::RateLimited { .. } => ErrorCategory::RateLimited,
            _ => ErrorCategory::GenerationUnreachable,
        }
    }
}

// ============================================================================
// VALIDATION / CONFIG
// ============================================================================

/// Input validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Unsupported host: {host}")]
    UnsupportedHost { host: String },

    #[error("No profile handle found in {input}")]
    MissingHandle { input: String },
}

impl ValidationError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::InvalidInput
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Provider not supported: {provider}")]
    ProviderNotSupported { provider: String },
}

// ============================================================================
// MASTER ERROR
// ============================================================================

/// Master error type for the analysis pipeline.
#[derive(Debug, Clone, Error)]
pub enum InsightError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Analysis timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

impl InsightError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            InsightError::Storage(e) => e.category(),
            InsightError::Acquisition(e) => e.category(),
            InsightError::Generation(e) => e.category(),
            InsightError::Validation(e) => e.category(),
            // Misconfiguration is a degraded system, not a caller mistake.
            InsightError::Config(_) => ErrorCategory::UpstreamInternal,
            InsightError::Timeout { .. } => ErrorCategory::Timeout,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Result type alias for pipeline operations.
pub type InsightResult<T> = Result<T, InsightError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_wire_tags_match_serde() {
        for category in ErrorCategory::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn test_retryable_partition() {
        assert!(!ErrorCategory::InvalidInput.is_retryable());
        assert!(!ErrorCategory::AuthFailure.is_retryable());
        assert!(!ErrorCategory::UpstreamInternal.is_retryable());
        assert!(ErrorCategory::RateLimited.is_retryable());
        assert!(ErrorCategory::Timeout.is_retryable());
        assert!(ErrorCategory::NetworkError.is_retryable());
    }

    #[test]
    fn test_only_store_unavailable_is_absorbed() {
        let absorbed: Vec<_> = ErrorCategory::ALL
            .iter()
            .filter(|c| c.is_absorbed())
            .collect();
        assert_eq!(absorbed, vec![&ErrorCategory::StoreUnavailable]);
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for category in ErrorCategory::ALL {
            assert!(seen.insert(category.user_message()));
        }
    }

    #[test]
    fn test_acquisition_error_display_rejected() {
        let err = AcquisitionError::Rejected {
            stage: AcquisitionStage::Create,
            status: 429,
            category: ErrorCategory::RateLimited,
            message: "quota exceeded".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("create"));
        assert!(msg.contains("429"));
        assert!(msg.contains("rate_limited"));
        assert!(msg.contains("quota exceeded"));
        assert_eq!(err.category(), ErrorCategory::RateLimited);
    }

    #[test]
    fn test_acquisition_error_categories() {
        let network = AcquisitionError::Network {
            stage: AcquisitionStage::Fetch,
            reason: "connection refused".to_string(),
        };
        assert_eq!(network.category(), ErrorCategory::NetworkError);
        assert_eq!(network.stage(), AcquisitionStage::Fetch);

        let incomplete = AcquisitionError::Incomplete {
            stage: AcquisitionStage::Fetch,
            reason: "empty body".to_string(),
        };
        assert_eq!(incomplete.category(), ErrorCategory::ProcessingIncomplete);

        assert_eq!(
            AcquisitionError::MissingExternalId.category(),
            ErrorCategory::UpstreamInternal
        );
        assert_eq!(
            AcquisitionError::MissingExternalId.stage(),
            AcquisitionStage::Create
        );
    }

    #[test]
    fn test_generation_error_categories() {
        let limited = GenerationError::RateLimited {
            provider: "gemini".to_string(),
            retry_after_ms: 1500,
        };
        let msg = format!("{}", limited);
        assert!(msg.contains("gemini"));
        assert!(msg.contains("1500"));
        assert_eq!(limited.category(), ErrorCategory::RateLimited);

        let unreachable = GenerationError::Unreachable {
            provider: "gemini".to_string(),
            reason: "dns".to_string(),
        };
        assert_eq!(unreachable.category(), ErrorCategory::GenerationUnreachable);
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "analyze_timeout".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("analyze_timeout"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_insight_error_from_variants() {
        let storage = InsightError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, InsightError::Storage(_)));
        assert_eq!(storage.category(), ErrorCategory::StoreUnavailable);

        let acquisition = InsightError::from(AcquisitionError::MissingExternalId);
        assert!(matches!(acquisition, InsightError::Acquisition(_)));

        let generation = InsightError::from(GenerationError::ProviderNotConfigured);
        assert!(matches!(generation, InsightError::Generation(_)));

        let validation = InsightError::from(ValidationError::RequiredFieldMissing {
            field: "url".to_string(),
        });
        assert_eq!(validation.category(), ErrorCategory::InvalidInput);
        assert!(!validation.is_retryable());

        let timeout = InsightError::Timeout { elapsed_ms: 120_000 };
        assert_eq!(timeout.category(), ErrorCategory::Timeout);
        assert!(format!("{}", timeout).contains("120000"));
    }
}
