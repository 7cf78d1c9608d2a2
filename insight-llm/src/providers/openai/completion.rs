//! OpenAI completion provider

use super::types::{ChatRequest, ChatResponse, Message, ResponseFormat};
use crate::providers::http::{ProviderClient, DEFAULT_REQUESTS_PER_MINUTE};
use crate::{CompletionProvider, CompletionRequest};
use async_trait::async_trait;
use insight_core::{ConfigError, GenerationError, LlmConfig};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI provider using chat completions.
pub struct OpenAiProvider {
    client: ProviderClient,
    authorization: String,
    model: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (e.g., "gpt-4o-mini")
    /// * `base_url` - API root override
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: Option<&str>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client: ProviderClient::new(
                "openai",
                base_url.unwrap_or(DEFAULT_BASE_URL),
                DEFAULT_REQUESTS_PER_MINUTE,
            )?,
            authorization: format!("Bearer {}", api_key.into()),
            model: model.into(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ConfigError> {
        Self::new(&config.api_key, &config.model, config.base_url.as_deref())
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: Some(request.system.clone()),
                },
                Message {
                    role: "user".to_string(),
                    content: Some(request.prompt.clone()),
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_output.then(|| ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        };

        let response: ChatResponse = self
            .client
            .post(
                "chat/completions",
                &[("Authorization", self.authorization.as_str())],
                &body,
            )
            .await?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                provider = "openai",
                prompt_tokens = usage.prompt_tokens,
                output_tokens = usage.completion_tokens.unwrap_or(0),
                "Completion usage"
            );
        }
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &self.client)
            .field("authorization", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}
