//! Analysis generation: one completion call, then the parse ladder.

use crate::parse::parse_analysis;
use crate::prompt::{build_user_prompt, SYSTEM_PROMPT};
use crate::{CompletionProvider, CompletionRequest};
use insight_core::{AnalysisResult, GenerationError, LlmConfig, ProfileSnapshot};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Produces an [`AnalysisResult`] from a profile snapshot.
#[derive(Clone)]
pub struct AnalysisGenerator {
    provider: Arc<dyn CompletionProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl AnalysisGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }

    pub fn from_config(provider: Arc<dyn CompletionProvider>, config: &LlmConfig) -> Self {
        Self::new(provider, config.temperature, config.max_tokens)
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    /// The exact request sent for a snapshot.
    pub fn request_for(&self, snapshot: &ProfileSnapshot) -> CompletionRequest {
        CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_user_prompt(snapshot),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            json_output: true,
        }
    }

    /// Generate an analysis.
    ///
    /// Exactly one provider call. Malformed output never fails; only an
    /// unreachable provider does.
    pub async fn generate(&self, snapshot: &ProfileSnapshot) -> Result<AnalysisResult, GenerationError> {
        let request = self.request_for(snapshot);
        let started = Instant::now();

        let text = self.provider.complete(&request).await?;
        let parsed = parse_analysis(&text);

        tracing::info!(
            provider = self.provider.provider_name(),
            model = self.provider.model_id(),
            outcome = ?parsed.outcome,
            response_chars = text.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis generated"
        );

        Ok(AnalysisResult {
            raw_response: json!({
                "text": text,
                "parse_outcome": parsed.outcome,
                "provider": self.provider.provider_name(),
                "model": self.provider.model_id(),
            }),
            summary: parsed.summary,
            strengths: parsed.strengths,
            weaknesses: parsed.weaknesses,
            outcome: parsed.outcome,
        })
    }
}

impl std::fmt::Debug for AnalysisGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisGenerator")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_id())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
