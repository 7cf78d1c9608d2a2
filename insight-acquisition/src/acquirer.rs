//! Create, settle, fetch.

use crate::payload::is_incomplete;
use crate::scores::extract_trait_scores;
use crate::source::ProfileSource;
use insight_core::{AcquisitionError, AcquisitionStage, IdentityKey, ProfileSnapshot};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Drives the two-phase upstream workflow for one identity.
#[derive(Clone)]
pub struct ProfileAcquirer {
    source: Arc<dyn ProfileSource>,
    settle_delay: Duration,
}

impl ProfileAcquirer {
    pub fn new(source: Arc<dyn ProfileSource>, settle_delay: Duration) -> Self {
        Self {
            source,
            settle_delay,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub fn source_name(&self) -> &str {
        self.source.source_name()
    }

    /// Acquire a profile snapshot.
    ///
    /// The settle delay is a single timed suspension between the two calls.
    /// The upstream offers no readiness signal, and fetching early yields a
    /// partial profile. Nothing is retried.
    pub async fn acquire(&self, identity: &IdentityKey) -> Result<ProfileSnapshot, AcquisitionError> {
        let started = Instant::now();

        let external_id = self.source.create(identity).await?;
        if external_id.trim().is_empty() {
            return Err(AcquisitionError::MissingExternalId);
        }
        tracing::info!(
            identity = %identity,
            external_id = %external_id,
            settle_ms = self.settle_delay.as_millis() as u64,
            "Profile creation accepted, waiting for upstream to settle"
        );

        tokio::time::sleep(self.settle_delay).await;

        let raw_payload = self.source.fetch(&external_id).await?;
        if is_incomplete(&raw_payload) {
            return Err(AcquisitionError::Incomplete {
                stage: AcquisitionStage::Fetch,
                reason: "profile payload is empty".to_string(),
            });
        }

        let trait_scores = extract_trait_scores(&raw_payload);
        tracing::info!(
            identity = %identity,
            external_id = %external_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Profile acquired"
        );

        Ok(ProfileSnapshot {
            external_id,
            raw_payload,
            trait_scores,
        })
    }
}

impl std::fmt::Debug for ProfileAcquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileAcquirer")
            .field("source", &self.source.source_name())
            .field("settle_delay", &self.settle_delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use insight_core::{ErrorCategory, IdentityNormalizer};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Records call order and answers from fixed results.
    struct StubSource {
        calls: Mutex<Vec<String>>,
        create: Result<String, AcquisitionError>,
        fetch: Result<Value, AcquisitionError>,
    }

    impl StubSource {
        fn new(
            create: Result<String, AcquisitionError>,
            fetch: Result<Value, AcquisitionError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                create,
                fetch,
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProfileSource for StubSource {
        async fn create(&self, identity: &IdentityKey) -> Result<String, AcquisitionError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("create:{}", identity));
            self.create.clone()
        }

        async fn fetch(&self, external_id: &str) -> Result<Value, AcquisitionError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("fetch:{}", external_id));
            self.fetch.clone()
        }

        fn source_name(&self) -> &str {
            "stub"
        }
    }

    fn identity() -> IdentityKey {
        IdentityNormalizer::permissive()
            .unwrap()
            .normalize("acme.example/in/jdoe")
            .unwrap()
    }

    fn profile_payload() -> Value {
        json!({"personality_analysis": {"big_five": {
            "openness": 72, "conscientiousness": 61, "extraversion": 40,
            "agreeableness": 55, "neuroticism": 30
        }}})
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_settle_delay_between_phases() {
        let source = StubSource::new(Ok("u1".to_string()), Ok(profile_payload()));
        let acquirer = ProfileAcquirer::new(source.clone(), Duration::from_secs(35));

        let started = tokio::time::Instant::now();
        let snapshot = acquirer.acquire(&identity()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(35));
        assert_eq!(snapshot.external_id, "u1");
        assert_eq!(snapshot.trait_scores.openness, 72.0);
        assert_eq!(snapshot.trait_scores.neuroticism, 30.0);
        assert_eq!(
            source.calls(),
            vec!["create:acme.example/in/jdoe".to_string(), "fetch:u1".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failure_skips_settle_and_fetch() {
        let rejected = AcquisitionError::Rejected {
            stage: AcquisitionStage::Create,
            status: 429,
            category: ErrorCategory::RateLimited,
            message: "slow down".to_string(),
        };
        let source = StubSource::new(Err(rejected.clone()), Ok(profile_payload()));
        let acquirer = ProfileAcquirer::new(source.clone(), Duration::from_secs(35));

        let started = tokio::time::Instant::now();
        let err = acquirer.acquire(&identity()).await.unwrap_err();

        assert_eq!(err, rejected);
        assert_eq!(err.stage(), AcquisitionStage::Create);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_external_id_is_missing() {
        let source = StubSource::new(Ok("  ".to_string()), Ok(profile_payload()));
        let acquirer = ProfileAcquirer::new(source.clone(), Duration::from_secs(35));
        let err = acquirer.acquire(&identity()).await.unwrap_err();
        assert_eq!(err, AcquisitionError::MissingExternalId);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_fetch_payload_is_incomplete() {
        let source = StubSource::new(Ok("u1".to_string()), Ok(json!({})));
        let acquirer = ProfileAcquirer::new(source, Duration::from_secs(1));
        let err = acquirer.acquire(&identity()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ProcessingIncomplete);
        assert_eq!(err.stage(), AcquisitionStage::Fetch);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_dimensions_default_to_midpoint() {
        let source = StubSource::new(
            Ok("u1".to_string()),
            Ok(json!({"personality_analysis": {"big_five": {"openness": 90}}})),
        );
        let acquirer = ProfileAcquirer::new(source, Duration::ZERO);
        let snapshot = acquirer.acquire(&identity()).await.unwrap();
        assert_eq!(snapshot.trait_scores.openness, 90.0);
        assert_eq!(snapshot.trait_scores.agreeableness, 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_does_not_block_other_identities() {
        let source = StubSource::new(Ok("u1".to_string()), Ok(profile_payload()));
        let acquirer = ProfileAcquirer::new(source, Duration::from_secs(35));
        let n = IdentityNormalizer::permissive().unwrap();
        let a = n.normalize("acme.example/in/a").unwrap();
        let b = n.normalize("acme.example/in/b").unwrap();

        let started = tokio::time::Instant::now();
        let (ra, rb) = tokio::join!(acquirer.acquire(&a), acquirer.acquire(&b));
        assert!(ra.is_ok() && rb.is_ok());
        assert!(started.elapsed() < Duration::from_secs(70));
    }
}
