//! Rate-limited JSON client shared by the completion providers

use insight_core::{ConfigError, GenerationError};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Requests per minute allowed per provider client.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 50;

/// Per-call HTTP timeout. The orchestrator's overall deadline is longer.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// POSTs JSON to one provider with rate limiting.
pub struct ProviderClient {
    provider: &'static str,
    client: Client,
    base_url: String,
    rate_limiter: Arc<Semaphore>,
    last_request: Arc<AtomicU64>,
    min_request_interval_ms: u64,
    start_time: Instant,
}

impl ProviderClient {
    /// Create a client for one provider.
    ///
    /// # Arguments
    /// * `provider` - Name used in errors and logs
    /// * `base_url` - API root, trailing slash optional
    /// * `requests_per_minute` - Maximum requests per minute
    pub fn new(
        provider: &'static str,
        base_url: &str,
        requests_per_minute: u32,
    ) -> Result<Self, ConfigError> {
        let rpm = requests_per_minute.max(1);
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "base_url".to_string(),
                value: base_url.to_string(),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            provider,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(Semaphore::new(rpm as usize)),
            last_request: Arc::new(AtomicU64::new(0)),
            min_request_interval_ms: (60_000 / rpm as u64).max(10),
            start_time: Instant::now(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post<Req: Serialize + Sync, Res: DeserializeOwned>(
        &self,
        endpoint: &str,
        headers: &[(&str, &str)],
        body: &Req,
    ) -> Result<Res, GenerationError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| self.unreachable(format!("Rate limiter error: {}", e)))?;

        let now_ms = self.start_time.elapsed().as_millis() as u64 + 1;
        let last_ms = self.last_request.load(Ordering::Relaxed);
        if last_ms != 0 {
            let elapsed = now_ms.saturating_sub(last_ms);
            if elapsed < self.min_request_interval_ms {
                tokio::time::sleep(Duration::from_millis(self.min_request_interval_ms - elapsed)).await;
            }
        }
        self.last_request
            .store(self.start_time.elapsed().as_millis() as u64 + 1, Ordering::Relaxed);

        let url = format!("{}/{}", self.base_url, endpoint);
        let started = Instant::now();
        let mut request = self.client.post(&url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("request timed out after {:?}", REQUEST_TIMEOUT)
            } else {
                format!("HTTP request failed: {}", e.without_url())
            };
            tracing::warn!(provider = self.provider, reason = %reason, "Completion provider unreachable");
            self.unreachable(reason)
        })?;

        let status = response.status();
        let retry_after_ms = parse_retry_after_ms(response.headers()).unwrap_or(0);
        tracing::debug!(
            provider = self.provider,
            status = status.as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Completion provider responded"
        );

        if status.is_success() {
            return response.json().await.map_err(|e| GenerationError::InvalidResponse {
                provider: self.provider.to_string(),
                reason: format!("Failed to parse response: {}", e.without_url()),
            });
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = error_message(&error_text);
        tracing::warn!(
            provider = self.provider,
            status = status.as_u16(),
            message = %message,
            "Completion provider rejected request"
        );

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited {
                provider: self.provider.to_string(),
                retry_after_ms,
            },
            _ => GenerationError::RequestFailed {
                provider: self.provider.to_string(),
                status: status.as_u16(),
                message,
            },
        })
    }

    fn unreachable(&self, reason: String) -> GenerationError {
        GenerationError::Unreachable {
            provider: self.provider.to_string(),
            reason,
        }
    }
}

/// `error.message` when the body has one, else the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .map(|seconds| (seconds * 1000.0) as u64)
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn test_error_message_prefers_nested_message() {
        assert_eq!(
            error_message(r#"{"error": {"message": "bad key", "type": "auth"}}"#),
            "bad key"
        );
        assert_eq!(error_message("  plain failure "), "plain failure");
    }

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after_ms(&headers), None);
        headers.insert("retry-after", HeaderValue::from_static("1.5"));
        assert_eq!(parse_retry_after_ms(&headers), Some(1500));
        headers.insert("retry-after", HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after_ms(&headers), None);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ProviderClient::new("test", "http://localhost:1/v1/", 10).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1/v1");
    }
}
