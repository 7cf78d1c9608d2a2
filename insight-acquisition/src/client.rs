//! Profile upstream HTTP client with rate limiting

use crate::payload::{extract_external_id, select_profile_payload};
use crate::source::ProfileSource;
use crate::status::{category_for_status, upstream_error_message};
use async_trait::async_trait;
use insight_core::{AcquisitionError, AcquisitionStage, ConfigError, IdentityKey, UpstreamConfig};
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

const SOURCE_NAME: &str = "humantic";

/// Profile upstream client with rate limiting.
pub struct ProfileApiClient {
    client: Client,
    api_key: String,
    base_url: String,
    request_timeout: Duration,
    rate_limiter: Arc<Semaphore>,
    last_request: Arc<AtomicU64>,
    min_request_interval_ms: u64,
    start_time: Instant,
}

impl ProfileApiClient {
    /// Create a client from upstream configuration.
    ///
    /// # Arguments
    /// * `config` - Base URL, credential, per-call timeout and request budget
    pub fn new(config: &UpstreamConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let rpm = config.requests_per_minute.max(1);
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "request_timeout".to_string(),
                value: format!("{:?}", config.request_timeout),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
            rate_limiter: Arc::new(Semaphore::new(rpm as usize)),
            last_request: Arc::new(AtomicU64::new(0)),
            min_request_interval_ms: (60_000 / rpm as u64).max(10),
            start_time: Instant::now(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one GET and return the decoded JSON body.
    ///
    /// A success body that is not JSON decodes to `Value::Null`; each stage
    /// decides what an unusable body means.
    async fn get_json(
        &self,
        stage: AcquisitionStage,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, AcquisitionError> {
        // Rate limiting: acquire permit
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| AcquisitionError::Network {
                stage,
                reason: format!("Rate limiter error: {}", e),
            })?;

        // Enforce minimum interval between requests
        let now_ms = self.start_time.elapsed().as_millis() as u64 + 1;
        let last_ms = self.last_request.load(Ordering::Relaxed);
        if last_ms != 0 {
            let elapsed = now_ms.saturating_sub(last_ms);
            if elapsed < self.min_request_interval_ms {
                let wait_ms = self.min_request_interval_ms - elapsed;
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            }
        }
        self.last_request
            .store(self.start_time.elapsed().as_millis() as u64 + 1, Ordering::Relaxed);

        let url = format!("{}/{}", self.base_url, endpoint);
        let started = Instant::now();
        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("request timed out after {:?}", self.request_timeout)
                } else {
                    format!("HTTP request failed: {}", e.without_url())
                };
                tracing::warn!(%stage, reason = %reason, "Profile upstream unreachable");
                AcquisitionError::Network { stage, reason }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AcquisitionError::Network {
            stage,
            reason: format!("Failed to read response body: {}", e.without_url()),
        })?;

        tracing::debug!(
            %stage,
            status = status.as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Profile upstream responded"
        );

        if !status.is_success() {
            let message = upstream_error_message(&body, status.as_u16());
            let category = category_for_status(status.as_u16());
            tracing::warn!(
                %stage,
                status = status.as_u16(),
                %category,
                message = %message,
                "Profile upstream rejected request"
            );
            return Err(AcquisitionError::Rejected {
                stage,
                status: status.as_u16(),
                category,
                message,
            });
        }

        Ok(serde_json::from_str(&body).unwrap_or_else(|e| {
            tracing::debug!(%stage, error = %e, "Profile upstream body is not JSON");
            Value::Null
        }))
    }
}

#[async_trait]
impl ProfileSource for ProfileApiClient {
    async fn create(&self, identity: &IdentityKey) -> Result<String, AcquisitionError> {
        let body = self
            .get_json(
                AcquisitionStage::Create,
                "user-profile/create",
                &[("id", identity.as_str())],
            )
            .await?;

        extract_external_id(&body).ok_or_else(|| {
            let keys: Vec<&str> = body
                .as_object()
                .map(|o| o.keys().map(String::as_str).collect())
                .unwrap_or_default();
            tracing::error!(identity = %identity, ?keys, "Create response carried no external id");
            AcquisitionError::MissingExternalId
        })
    }

    async fn fetch(&self, external_id: &str) -> Result<Value, AcquisitionError> {
        let body = self
            .get_json(
                AcquisitionStage::Fetch,
                "user-profile",
                &[("id", external_id), ("persona", "true")],
            )
            .await?;
        Ok(select_profile_payload(body))
    }

    fn source_name(&self) -> &str {
        SOURCE_NAME
    }
}

impl std::fmt::Debug for ProfileApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
