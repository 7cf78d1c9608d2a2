//! Anthropic (Claude) completion provider

use super::types::{ContentBlock, Message, MessageRequest, MessageResponse};
use crate::providers::http::{ProviderClient, DEFAULT_REQUESTS_PER_MINUTE};
use crate::{CompletionProvider, CompletionRequest};
use async_trait::async_trait;
use insight_core::{ConfigError, GenerationError, LlmConfig};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Claude provider using the Messages API.
///
/// There is no native JSON mode; the system prompt carries the output
/// contract and the parse ladder handles the rest.
pub struct AnthropicProvider {
    client: ProviderClient,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key
    /// * `model` - Model name (e.g., "claude-3-5-sonnet-20241022")
    /// * `base_url` - API root override
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: Option<&str>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client: ProviderClient::new(
                "anthropic",
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

    /// Extract text from content blocks.
    fn extract_text(content: Vec<ContentBlock>) -> String {
        content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let body = MessageRequest {
            model: self.model.clone(),
            system: Some(request.system.clone()),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            max_tokens: request.max_tokens,
            temperature: Some(request.temperature),
        };

        let response: MessageResponse = self
            .client
            .post(
                "messages",
                &[
                    ("x-api-key", self.api_key.as_str()),
                    ("anthropic-version", API_VERSION),
                ],
                &body,
            )
            .await?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                provider = "anthropic",
                prompt_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = ?response.stop_reason,
                "Completion usage"
            );
        }
        Ok(Self::extract_text(response.content))
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("client", &self.client)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}
