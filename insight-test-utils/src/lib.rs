//! InsightProfile Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Scripted upstream doubles that count calls
//! - A record store that is always down
//! - Fixtures for the canonical profile scenario
//! - Proptest generators and custom assertions

pub use insight_storage::InMemoryRecordStore;

pub use insight_core::{
    AcquisitionError, AcquisitionStage, AnalysisResult, EntityId, ErrorCategory, GenerationError,
    IdentityKey, IdentityNormalizer, InsightError, InsightResult, ParseOutcome, ProfileRecord,
    ProfileSnapshot, StorageError, StoreStats, StoredAnalysis, TraitScores,
};

use async_trait::async_trait;
use insight_acquisition::ProfileSource;
use insight_core::AnalysisRecord;
use insight_llm::{CompletionProvider, CompletionRequest};
use insight_storage::RecordStore;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// SCRIPTED PROFILE SOURCE
// ============================================================================

/// Profile upstream double with scripted answers and call counters.
///
/// Answers can be changed between calls, so one instance can first fail and
/// then succeed.
#[derive(Debug)]
pub struct ScriptedProfileSource {
    create_result: Mutex<Result<String, AcquisitionError>>,
    fetch_result: Mutex<Result<Value, AcquisitionError>>,
    create_delay: Mutex<Duration>,
    create_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    created: Mutex<Vec<String>>,
}

impl ScriptedProfileSource {
    /// Answers with the scenario external id and payload.
    pub fn new() -> Self {
        Self::with_payload(fixtures::scenario_payload())
    }

    pub fn with_payload(payload: Value) -> Self {
        Self {
            create_result: Mutex::new(Ok(fixtures::SCENARIO_EXTERNAL_ID.to_string())),
            fetch_result: Mutex::new(Ok(payload)),
            create_delay: Mutex::new(Duration::ZERO),
            create_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn set_create_result(&self, result: Result<String, AcquisitionError>) {
        if let Ok(mut slot) = self.create_result.lock() {
            *slot = result;
        }
    }

    pub fn set_fetch_result(&self, result: Result<Value, AcquisitionError>) {
        if let Ok(mut slot) = self.fetch_result.lock() {
            *slot = result;
        }
    }

    /// Delay applied inside `create`, before answering.
    pub fn set_create_delay(&self, delay: Duration) {
        if let Ok(mut slot) = self.create_delay.lock() {
            *slot = delay;
        }
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Identities passed to `create`, in call order.
    pub fn created_identities(&self) -> Vec<String> {
        self.created.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Default for ScriptedProfileSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileSource for ScriptedProfileSource {
    async fn create(&self, identity: &IdentityKey) -> Result<String, AcquisitionError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut created) = self.created.lock() {
            created.push(identity.to_string());
        }
        let delay = self.create_delay.lock().map(|d| *d).unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.create_result
            .lock()
            .map(|r| r.clone())
            .unwrap_or(Err(AcquisitionError::MissingExternalId))
    }

    async fn fetch(&self, _external_id: &str) -> Result<Value, AcquisitionError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_result
            .lock()
            .map(|r| r.clone())
            .unwrap_or(Ok(Value::Null))
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// SCRIPTED COMPLETION PROVIDER
// ============================================================================

/// Completion provider double with a scripted reply and a call counter.
#[derive(Debug)]
pub struct ScriptedCompletionProvider {
    reply: Mutex<Result<String, GenerationError>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletionProvider {
    /// Replies with the scenario JSON analysis.
    pub fn new() -> Self {
        Self::replying(fixtures::scenario_reply())
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Mutex::new(Ok(text.into())),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_reply(&self, reply: Result<String, GenerationError>) {
        if let Ok(mut slot) = self.reply.lock() {
            *slot = reply;
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        if let Ok(mut slot) = self.delay.lock() {
            *slot = delay;
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Default for ScriptedCompletionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletionProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }
        let delay = self.delay.lock().map(|d| *d).unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .lock()
            .map(|r| r.clone())
            .unwrap_or(Err(GenerationError::ProviderNotConfigured))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }
}

// ============================================================================
// FAILING RECORD STORE
// ============================================================================

/// Record store whose every operation reports the store as unavailable.
#[derive(Debug, Default)]
pub struct FailingRecordStore {
    calls: AtomicUsize,
}

impl FailingRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations attempted against this store.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self, operation: &str) -> Result<T, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Unavailable {
            reason: format!("{operation}: connection refused"),
        })
    }
}

#[async_trait]
impl RecordStore for FailingRecordStore {
    async fn find_profile(&self, _key: &IdentityKey) -> Result<Option<ProfileRecord>, StorageError> {
        self.fail("find_profile")
    }

    async fn latest_analysis(
        &self,
        _profile_id: EntityId,
    ) -> Result<Option<AnalysisRecord>, StorageError> {
        self.fail("latest_analysis")
    }

    async fn list_profiles(&self, _limit: usize) -> Result<Vec<ProfileRecord>, StorageError> {
        self.fail("list_profiles")
    }

    async fn stats(&self, _window: Duration) -> Result<StoreStats, StorageError> {
        self.fail("stats")
    }

    async fn upsert_profile(
        &self,
        _key: &IdentityKey,
        _snapshot: &ProfileSnapshot,
    ) -> Result<ProfileRecord, StorageError> {
        self.fail("upsert_profile")
    }

    async fn insert_analysis(
        &self,
        _profile_id: EntityId,
        _result: &AnalysisResult,
    ) -> Result<AnalysisRecord, StorageError> {
        self.fail("insert_analysis")
    }

    async fn delete(&self, _key: &IdentityKey) -> Result<u64, StorageError> {
        self.fail("delete")
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.fail("ping")
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for identities, payloads and model output.

    use super::*;
    use proptest::prelude::*;

    /// A profile handle as the upstream accepts it.
    pub fn arb_handle() -> impl Strategy<Value = String> {
        "[a-z0-9][a-z0-9_-]{0,29}"
    }

    /// A URL for `handle` with random insignificant decorations.
    pub fn arb_decorated_url(handle: String) -> impl Strategy<Value = String> {
        (
            prop_oneof![Just("https://"), Just("HTTPS://"), Just("http://"), Just("")],
            prop_oneof![Just("www."), Just("")],
            prop_oneof![Just("/"), Just("")],
            prop_oneof![Just("?utm_source=x"), Just("#about"), Just("")],
        )
            .prop_map(move |(scheme, www, slash, tail)| {
                format!("{scheme}{www}linkedin.com/in/{handle}{slash}{tail}")
            })
    }

    /// Model text that contains no JSON object.
    pub fn arb_prose() -> impl Strategy<Value = String> {
        "[A-Za-z ,.!?']{1,1200}"
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for the canonical profile scenario.

    use super::*;
    use serde_json::json;

    pub const SCENARIO_URL: &str = "https://acme.example/in/jdoe";
    pub const SCENARIO_IDENTITY: &str = "acme.example/in/jdoe";
    pub const SCENARIO_EXTERNAL_ID: &str = "u1";

    /// Normalizer accepting any host.
    pub fn permissive_normalizer() -> IdentityNormalizer {
        match IdentityNormalizer::permissive() {
            Ok(n) => n,
            Err(e) => panic!("permissive normalizer: {e}"),
        }
    }

    /// Normalize through the permissive normalizer.
    pub fn identity(url: &str) -> IdentityKey {
        match permissive_normalizer().normalize(url) {
            Ok(key) => key,
            Err(e) => panic!("fixture identity {url:?}: {e}"),
        }
    }

    pub fn scenario_identity() -> IdentityKey {
        identity(SCENARIO_URL)
    }

    pub fn scenario_scores() -> TraitScores {
        TraitScores {
            openness: 72.0,
            conscientiousness: 61.0,
            extraversion: 40.0,
            agreeableness: 55.0,
            neuroticism: 30.0,
        }
    }

    /// Fetch payload for the scenario profile.
    pub fn scenario_payload() -> Value {
        json!({
            "display_name": "Jane Doe",
            "user_description": "Engineering Manager",
            "personality_analysis": {"big_five": {
                "openness": 72,
                "conscientiousness": 61,
                "extraversion": 40,
                "agreeableness": 55,
                "neuroticism": 30
            }}
        })
    }

    pub fn scenario_snapshot() -> ProfileSnapshot {
        ProfileSnapshot {
            external_id: SCENARIO_EXTERNAL_ID.to_string(),
            raw_payload: scenario_payload(),
            trait_scores: scenario_scores(),
        }
    }

    /// Well-formed model reply with three strengths and three weaknesses.
    pub fn scenario_reply() -> String {
        json!({
            "summary": "A curious, organized engineering leader who prefers depth over small talk.",
            "strengths": ["Systems thinking", "Follow-through", "Calm under pressure"],
            "weaknesses": ["Can over-plan", "Slow to delegate", "Reserved in large groups"]
        })
        .to_string()
    }

    pub fn scenario_result() -> AnalysisResult {
        AnalysisResult {
            summary: "A curious, organized engineering leader.".to_string(),
            strengths: vec!["Systems thinking".to_string()],
            weaknesses: vec!["Can over-plan".to_string()],
            raw_response: json!({"text": scenario_reply()}),
            outcome: ParseOutcome::Strict,
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over error categories.

    use super::*;

    /// Assert that a result failed with the given category.
    #[track_caller]
    pub fn assert_category<T: std::fmt::Debug>(result: &InsightResult<T>, expected: ErrorCategory) {
        match result {
            Err(e) => assert_eq!(e.category(), expected, "wrong category for {e:?}"),
            Ok(v) => panic!("Expected {expected} error, got Ok: {v:?}"),
        }
    }

    /// Assert that a result did not surface a store failure.
    #[track_caller]
    pub fn assert_not_store_error<T: std::fmt::Debug>(result: &InsightResult<T>) {
        if let Err(e) = result {
            assert_ne!(
                e.category(),
                ErrorCategory::StoreUnavailable,
                "store failure leaked to caller: {e:?}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_source_counts_and_switches() {
        let source = ScriptedProfileSource::new();
        let key = fixtures::scenario_identity();
        assert_eq!(source.create(&key).await.unwrap(), "u1");
        source.set_create_result(Err(AcquisitionError::MissingExternalId));
        assert!(source.create(&key).await.is_err());
        assert_eq!(source.create_calls(), 2);
        assert_eq!(source.created_identities(), vec![fixtures::SCENARIO_IDENTITY; 2]);
    }

    #[tokio::test]
    async fn test_failing_store_reports_unavailable() {
        let store = FailingRecordStore::new();
        let err = store.ping().await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::StoreUnavailable);
        assert!(store.find(&fixtures::scenario_identity()).await.is_err());
        assert_eq!(store.calls(), 2);
    }
}
