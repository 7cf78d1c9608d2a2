//! Configuration types

use crate::{ConfigError, IdentityNormalizer, DEFAULT_ALLOWED_HOST};
use std::time::Duration;

/// Default wait between the upstream create and fetch calls.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(35);
/// Default age after which a cached profile is refreshed.
pub const DEFAULT_CACHE_EXPIRY: Duration = Duration::from_secs(30 * 24 * 60 * 60);
/// Default bound on one complete analyze call.
pub const DEFAULT_ANALYZE_TIMEOUT: Duration = Duration::from_secs(120);

// ============================================================================
// PIPELINE
// ============================================================================

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightConfig {
    pub settle_delay: Duration,
    pub cache_expiry: Duration,
    pub analyze_timeout: Duration,
    /// Trailing window for the "recent profiles" statistic.
    pub stats_window: Duration,
    /// Hosts accepted as identity URLs; empty accepts any host.
    pub allowed_hosts: Vec<String>,
    /// Default page size for profile listings.
    pub profile_list_limit: usize,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            cache_expiry: DEFAULT_CACHE_EXPIRY,
            analyze_timeout: DEFAULT_ANALYZE_TIMEOUT,
            stats_window: Duration::from_secs(7 * 24 * 60 * 60),
            allowed_hosts: vec![DEFAULT_ALLOWED_HOST.to_string()],
            profile_list_limit: 100,
        }
    }
}

impl InsightConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `INSIGHT_SETTLE_DELAY_SECS`: create-to-fetch wait (default: 35)
    /// - `INSIGHT_CACHE_EXPIRY_DAYS`: profile freshness window (default: 30)
    /// - `INSIGHT_ANALYZE_TIMEOUT_SECS`: bound on one analyze call (default: 120)
    /// - `INSIGHT_STATS_WINDOW_DAYS`: recent-profiles window (default: 7)
    /// - `INSIGHT_ALLOWED_HOSTS`: comma-separated host allow list (default: linkedin.com)
    /// - `INSIGHT_PROFILE_LIST_LIMIT`: default listing size (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            settle_delay: std::env::var("INSIGHT_SETTLE_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.settle_delay),
            cache_expiry: std::env::var("INSIGHT_CACHE_EXPIRY_DAYS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(days)
                .unwrap_or(defaults.cache_expiry),
            analyze_timeout: std::env::var("INSIGHT_ANALYZE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.analyze_timeout),
            stats_window: std::env::var("INSIGHT_STATS_WINDOW_DAYS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(days)
                .unwrap_or(defaults.stats_window),
            allowed_hosts: std::env::var("INSIGHT_ALLOWED_HOSTS")
                .ok()
                .map(|s| parse_host_list(&s))
                .unwrap_or(defaults.allowed_hosts),
            profile_list_limit: std::env::var("INSIGHT_PROFILE_LIST_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.profile_list_limit),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("cache_expiry", self.cache_expiry),
            ("analyze_timeout", self.analyze_timeout),
            ("stats_window", self.stats_window),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: format!("{:?}", value),
                    reason: format!("{} must be greater than 0", field),
                });
            }
        }

        if self.analyze_timeout <= self.settle_delay {
            return Err(ConfigError::InvalidValue {
                field: "analyze_timeout".to_string(),
                value: format!("{:?}", self.analyze_timeout),
                reason: format!(
                    "analyze_timeout must exceed settle_delay ({:?})",
                    self.settle_delay
                ),
            });
        }

        if self.profile_list_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "profile_list_limit".to_string(),
                value: "0".to_string(),
                reason: "profile_list_limit must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Build the identity normalizer for the configured allow list.
    pub fn normalizer(&self) -> Result<IdentityNormalizer, ConfigError> {
        IdentityNormalizer::new(&self.allowed_hosts)
    }
}

// ============================================================================
// PROFILE UPSTREAM
// ============================================================================

/// Default base URL of the profile upstream.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://api.humantic.ai/v1";

/// Profile upstream client configuration.
#[derive(Clone, PartialEq)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: String,
    /// Per-call deadline; exceeding it is a network error.
    pub request_timeout: Duration,
    /// Outbound request budget per minute.
    pub requests_per_minute: u32,
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

impl UpstreamConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(30),
            requests_per_minute: 30,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `INSIGHT_UPSTREAM_API_KEY`: credential (required)
    /// - `INSIGHT_UPSTREAM_BASE_URL`: API root (default: https://api.humantic.ai/v1)
    /// - `INSIGHT_UPSTREAM_TIMEOUT_SECS`: per-call deadline (default: 30)
    /// - `INSIGHT_UPSTREAM_RPM`: requests per minute (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("INSIGHT_UPSTREAM_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "INSIGHT_UPSTREAM_API_KEY".to_string(),
            })?;
        let defaults = Self::new(api_key);

        Ok(Self {
            base_url: std::env::var("INSIGHT_UPSTREAM_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.base_url),
            request_timeout: std::env::var("INSIGHT_UPSTREAM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            requests_per_minute: std::env::var("INSIGHT_UPSTREAM_RPM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.requests_per_minute),
            api_key: defaults.api_key,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "base_url".to_string(),
                value: self.base_url.clone(),
                reason: "base_url must be an http(s) URL".to_string(),
            });
        }
        if self.requests_per_minute == 0 {
            return Err(ConfigError::InvalidValue {
                field: "requests_per_minute".to_string(),
                value: "0".to_string(),
                reason: "requests_per_minute must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// LANGUAGE MODEL
// ============================================================================

/// Supported completion backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProviderKind {
    Gemini,
    Anthropic,
    OpenAi,
}

impl LlmProviderKind {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(LlmProviderKind::Gemini),
            "anthropic" | "claude" => Ok(LlmProviderKind::Anthropic),
            "openai" => Ok(LlmProviderKind::OpenAi),
            other => Err(ConfigError::ProviderNotSupported {
                provider: other.to_string(),
            }),
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProviderKind::Gemini => "gemini-2.5-flash",
            LlmProviderKind::Anthropic => "claude-3-5-sonnet-20241022",
            LlmProviderKind::OpenAi => "gpt-4o-mini",
        }
    }
}

/// Completion provider configuration.
#[derive(Clone, PartialEq)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Override of the provider's API root, mostly for tests and proxies.
    pub base_url: Option<String>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl LlmConfig {
    pub fn new(provider: LlmProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: provider.default_model().to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            base_url: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `INSIGHT_LLM_PROVIDER`: gemini, anthropic or openai (default: gemini)
    /// - `INSIGHT_LLM_API_KEY`: credential (required)
    /// - `INSIGHT_LLM_MODEL`: model id (default: provider specific)
    /// - `INSIGHT_LLM_TEMPERATURE`: sampling temperature (default: 0.7)
    /// - `INSIGHT_LLM_MAX_TOKENS`: output token cap (default: 2048)
    /// - `INSIGHT_LLM_BASE_URL`: API root override
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider = match std::env::var("INSIGHT_LLM_PROVIDER") {
            Ok(value) if !value.trim().is_empty() => LlmProviderKind::parse(&value)?,
            _ => LlmProviderKind::Gemini,
        };
        let api_key = std::env::var("INSIGHT_LLM_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "INSIGHT_LLM_API_KEY".to_string(),
            })?;
        let defaults = Self::new(provider, api_key);

        Ok(Self {
            model: std::env::var("INSIGHT_LLM_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.model),
            temperature: std::env::var("INSIGHT_LLM_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.temperature),
            max_tokens: std::env::var("INSIGHT_LLM_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tokens),
            base_url: std::env::var("INSIGHT_LLM_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            provider,
            api_key: defaults.api_key,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "temperature".to_string(),
                value: self.temperature.to_string(),
                reason: "temperature must be between 0.0 and 2.0".to_string(),
            });
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_tokens".to_string(),
                value: "0".to_string(),
                reason: "max_tokens must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

fn days(n: u64) -> Duration {
    Duration::from_secs(n * 24 * 60 * 60)
}

/// Split a comma-separated host list, dropping blanks.
pub fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = InsightConfig::default();
        assert_eq!(config.settle_delay, Duration::from_secs(35));
        assert_eq!(config.cache_expiry, Duration::from_secs(30 * 86_400));
        assert_eq!(config.analyze_timeout, Duration::from_secs(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_timeout_shorter_than_settle() {
        let config = InsightConfig {
            settle_delay: Duration::from_secs(60),
            analyze_timeout: Duration::from_secs(30),
            ..InsightConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "analyze_timeout"));
    }

    #[test]
    fn test_validate_allows_zero_settle_delay() {
        let config = InsightConfig {
            settle_delay: Duration::ZERO,
            ..InsightConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_expiry() {
        let config = InsightConfig {
            cache_expiry: Duration::ZERO,
            ..InsightConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_host_list() {
        assert_eq!(
            parse_host_list(" linkedin.com, ,acme.example "),
            vec!["linkedin.com".to_string(), "acme.example".to_string()]
        );
        assert!(parse_host_list("").is_empty());
    }

    #[test]
    fn test_normalizer_uses_allow_list() {
        let config = InsightConfig {
            allowed_hosts: vec!["acme.example".to_string()],
            ..InsightConfig::default()
        };
        let normalizer = config.normalizer().unwrap();
        assert!(normalizer.normalize("acme.example/in/jdoe").is_ok());
        assert!(normalizer.normalize("linkedin.com/in/jdoe").is_err());
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(LlmProviderKind::parse("Gemini").unwrap(), LlmProviderKind::Gemini);
        assert_eq!(LlmProviderKind::parse("claude").unwrap(), LlmProviderKind::Anthropic);
        assert_eq!(LlmProviderKind::parse("openai").unwrap(), LlmProviderKind::OpenAi);
        assert!(matches!(
            LlmProviderKind::parse("llama"),
            Err(ConfigError::ProviderNotSupported { .. })
        ));
    }

    #[test]
    fn test_llm_config_defaults_and_validation() {
        let mut config = LlmConfig::new(LlmProviderKind::Gemini, "key");
        assert_eq!(config.model, "gemini-2.5-flash");
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());

        config.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let upstream = UpstreamConfig::new("super-secret");
        let llm = LlmConfig::new(LlmProviderKind::OpenAi, "also-secret");
        assert!(!format!("{:?}", upstream).contains("super-secret"));
        assert!(!format!("{:?}", llm).contains("also-secret"));
    }

    #[test]
    fn test_upstream_validate_rejects_bad_url() {
        let mut config = UpstreamConfig::new("k");
        assert!(config.validate().is_ok());
        config.base_url = "api.example".to_string();
        assert!(config.validate().is_err());
    }
}
