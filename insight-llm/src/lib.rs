//! InsightProfile LLM - Completion Providers and Analysis Generation
//!
//! Provider-agnostic completion trait, concrete HTTP providers, the prompt
//! built from an acquired profile, and the parse ladder that turns model
//! text into a typed analysis.

use async_trait::async_trait;
use insight_core::{ConfigError, GenerationError, LlmConfig, LlmProviderKind};
use std::sync::Arc;

pub mod generator;
pub mod parse;
pub mod prompt;
pub mod providers;

pub use generator::AnalysisGenerator;
pub use parse::{parse_analysis, ParsedAnalysis, MAX_LIST_ITEMS, SUMMARY_FALLBACK_CHARS};
pub use prompt::{build_user_prompt, ProfileInsights, SYSTEM_PROMPT};
pub use providers::{AnthropicProvider, GeminiProvider, OpenAiProvider};

// ============================================================================
// COMPLETION PROVIDER TRAIT
// ============================================================================

/// One single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Fixed instruction framing the model's role.
    pub system: String,
    /// The user turn.
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider for JSON output where it supports that natively.
    pub json_output: bool,
}

/// Trait for text completion backends.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one completion.
    ///
    /// # Arguments
    /// * `request` - System instruction, prompt and sampling settings
    ///
    /// # Returns
    /// * `Ok(String)` - Model text, possibly empty or malformed
    /// * `Err(GenerationError)` - If the model could not be reached
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;

    /// Provider name for logs and metrics.
    fn provider_name(&self) -> &str;

    /// Model identifier sent to the provider.
    fn model_id(&self) -> &str;
}

// ============================================================================
// PROVIDER FACTORY
// ============================================================================

/// Build the configured completion provider.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>, ConfigError> {
    config.validate()?;
    let provider: Arc<dyn CompletionProvider> = match config.provider {
        LlmProviderKind::Gemini => Arc::new(GeminiProvider::from_config(config)?),
        LlmProviderKind::Anthropic => Arc::new(AnthropicProvider::from_config(config)?),
        LlmProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(config)?),
    };
    tracing::info!(
        provider = provider.provider_name(),
        model = provider.model_id(),
        "Completion provider configured"
    );
    Ok(provider)
}
