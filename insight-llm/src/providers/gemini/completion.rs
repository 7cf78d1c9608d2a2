//! Gemini completion provider

use super::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig};
use crate::providers::http::{ProviderClient, DEFAULT_REQUESTS_PER_MINUTE};
use crate::{CompletionProvider, CompletionRequest};
use async_trait::async_trait;
use insight_core::{ConfigError, GenerationError, LlmConfig};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider using the generateContent endpoint.
pub struct GeminiProvider {
    client: ProviderClient,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    ///
    /// # Arguments
    /// * `api_key` - Google AI API key
    /// * `model` - Model name (e.g., "gemini-2.5-flash")
    /// * `base_url` - API root override
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: Option<&str>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client: ProviderClient::new(
                "gemini",
                base_url.unwrap_or(DEFAULT_BASE_URL),
                DEFAULT_REQUESTS_PER_MINUTE,
            )?,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ConfigError> {
        Self::new(&config.api_key, &config.model, config.base_url.as_deref())
    }

    /// Concatenate the text parts of the first candidate.
    fn extract_text(response: GenerateContentResponse) -> String {
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let body = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), request.prompt.clone())],
            system_instruction: Some(Content::text(None, request.system.clone())),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type: request
                    .json_output
                    .then(|| "application/json".to_string()),
            },
        };

        let endpoint = format!("models/{}:generateContent", self.model);
        let response: GenerateContentResponse = self
            .client
            .post(&endpoint, &[("x-goog-api-key", self.api_key.as_str())], &body)
            .await?;

        if let Some(usage) = &response.usage_metadata {
            tracing::debug!(
                provider = "gemini",
                prompt_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "Completion usage"
            );
        }
        Ok(Self::extract_text(response))
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("client", &self.client)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}
