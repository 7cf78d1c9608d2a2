//! Analysis Service
//!
//! Cache-aside orchestration of the acquire-and-generate pipeline:
//! freshness checks, force refresh, per-identity single flight, the overall
//! timeout, and degraded operation when the record store is absent or down.

use chrono::Utc;
use insight_acquisition::ProfileAcquirer;
use insight_core::{
    AnalysisResponse, ComponentHealth, ConfigError, EntityId, IdentityKey, IdentityNormalizer,
    InsightConfig, InsightError, InsightResult, ProfileRecord, ProfileSnapshot, StorageError,
    StoreStats, StoredAnalysis, ValidationError,
};
use insight_llm::AnalysisGenerator;
use insight_storage::{assess, RecordStore};
use std::sync::Arc;
use std::time::Instant;

use super::single_flight::SingleFlight;
use crate::telemetry::{metrics, CacheOutcome};
use crate::types::{ClearCacheResponse, ProfileExistsResponse, ProfileSummary, ValidateUrlResponse};

/// Upper bound on a profile listing page.
pub const MAX_PROFILE_LIST_LIMIT: usize = 500;

/// What the store holds for an identity.
#[derive(Debug)]
enum CacheLookup {
    /// Fresh profile with an analysis generated from its current snapshot.
    Hit(StoredAnalysis),
    /// Fresh profile without a usable analysis; its snapshot can be reused.
    ProfileOnly(ProfileRecord),
    Stale,
    Miss,
}

/// Store-side view of service health.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub store_connected: bool,
    pub store: ComponentHealth,
    pub stats: Option<StoreStats>,
}

/// Orchestrates profile acquisition, analysis generation and caching.
pub struct AnalysisService {
    normalizer: IdentityNormalizer,
    store: Option<Arc<dyn RecordStore>>,
    acquirer: ProfileAcquirer,
    generator: AnalysisGenerator,
    flights: SingleFlight<InsightResult<AnalysisResponse>>,
    config: InsightConfig,
}

impl AnalysisService {
    /// Build the service. `store: None` runs permanently degraded.
    pub fn new(
        config: InsightConfig,
        store: Option<Arc<dyn RecordStore>>,
        acquirer: ProfileAcquirer,
        generator: AnalysisGenerator,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let normalizer = config.normalizer()?;
        if store.is_none() {
            tracing::warn!("No record store configured, every analysis will be computed");
        }
        Ok(Self {
            normalizer,
            store,
            acquirer,
            generator,
            flights: SingleFlight::new(),
            config,
        })
    }

    /// Identities with a pipeline running or waiting.
    pub fn in_flight(&self) -> Vec<String> {
        self.flights.in_flight_keys()
    }

    // ========================================================================
    // ANALYZE
    // ========================================================================

    /// Analyze a profile, serving from the store when a fresh analysis exists.
    ///
    /// The whole call, including waiting for another caller's pipeline on the
    /// same identity, is bounded by the configured timeout.
    pub async fn analyze(&self, raw: &str, force_refresh: bool) -> InsightResult<AnalysisResponse> {
        let identity = self.normalizer.normalize(raw)?;
        let started = Instant::now();

        match tokio::time::timeout(
            self.config.analyze_timeout,
            self.analyze_identity(&identity, force_refresh),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::warn!(
                    identity = %identity,
                    elapsed_ms,
                    timeout_ms = self.config.analyze_timeout.as_millis() as u64,
                    "Analysis timed out"
                );
                Err(InsightError::Timeout { elapsed_ms })
            }
        }
    }

    async fn analyze_identity(
        &self,
        identity: &IdentityKey,
        force_refresh: bool,
    ) -> InsightResult<AnalysisResponse> {
        if force_refresh {
            record_cache(CacheOutcome::Bypass);
        } else if let CacheLookup::Hit(stored) = self.lookup(identity).await {
            record_cache(CacheOutcome::Hit);
            tracing::info!(identity = %identity, "Serving cached analysis");
            return Ok(AnalysisResponse::from_cache(&stored));
        }

        let mut flight = self.flights.acquire(identity.as_str()).await;

        // Another caller may have finished the pipeline while we waited. Its
        // outcome is taken from the flight first, since the store may not
        // have kept it.
        if !force_refresh {
            if let Some(outcome) = flight.shared() {
                tracing::info!(
                    identity = %identity,
                    success = outcome.is_ok(),
                    "Sharing outcome of a concurrent pipeline"
                );
                return outcome;
            }
        }

        let reusable = if force_refresh {
            None
        } else {
            match self.lookup(identity).await {
                CacheLookup::Hit(stored) => {
                    record_cache(CacheOutcome::Hit);
                    tracing::info!(identity = %identity, "Serving analysis computed by a concurrent caller");
                    return Ok(AnalysisResponse::from_cache(&stored));
                }
                CacheLookup::ProfileOnly(profile) => {
                    record_cache(CacheOutcome::Miss);
                    Some(profile)
                }
                CacheLookup::Stale => {
                    record_cache(CacheOutcome::Stale);
                    None
                }
                CacheLookup::Miss => {
                    record_cache(CacheOutcome::Miss);
                    None
                }
            }
        };

        let pipeline = PipelineTimer::start();
        let result = self.run_pipeline(identity, reusable).await;
        pipeline.finish(match &result {
            Ok(_) => "success",
            Err(e) => e.category().as_str(),
        });
        flight.publish(result.clone());
        result
    }

    /// Acquire (or reuse), persist the profile, generate, persist the analysis.
    async fn run_pipeline(
        &self,
        identity: &IdentityKey,
        reusable: Option<ProfileRecord>,
    ) -> InsightResult<AnalysisResponse> {
        let (snapshot, profile_id) = match reusable {
            Some(profile) => {
                tracing::info!(
                    identity = %identity,
                    profile_id = %profile.profile_id,
                    "Reusing stored profile, skipping acquisition"
                );
                (profile.snapshot(), Some(profile.profile_id))
            }
            None => {
                let snapshot = self.acquire(identity).await?;
                let profile_id = self.persist_profile(identity, &snapshot).await;
                (snapshot, profile_id)
            }
        };

        let result = match self.generator.generate(&snapshot).await {
            Ok(result) => {
                record_upstream("generation", "success");
                result
            }
            Err(e) => {
                record_upstream("generation", e.category().as_str());
                tracing::error!(
                    identity = %identity,
                    provider = self.generator.provider_name(),
                    error = %e,
                    "Analysis generation failed, profile kept"
                );
                return Err(e.into());
            }
        };

        if let (Some(store), Some(profile_id)) = (&self.store, profile_id) {
            if let Err(e) = store.insert_analysis(profile_id, &result).await {
                self.absorb("insert_analysis", &e);
            }
        }

        tracing::info!(
            identity = %identity,
            outcome = ?result.outcome,
            "Analysis computed"
        );
        Ok(AnalysisResponse::computed(snapshot.trait_scores, &result))
    }

    async fn acquire(&self, identity: &IdentityKey) -> InsightResult<ProfileSnapshot> {
        match self.acquirer.acquire(identity).await {
            Ok(snapshot) => {
                record_upstream("acquisition", "success");
                Ok(snapshot)
            }
            Err(e) => {
                record_upstream("acquisition", e.category().as_str());
                tracing::error!(
                    identity = %identity,
                    stage = %e.stage(),
                    category = %e.category(),
                    error = %e,
                    "Profile acquisition failed"
                );
                Err(e.into())
            }
        }
    }

    /// Upsert the profile. Returns its id, or `None` when the write was absorbed.
    async fn persist_profile(
        &self,
        identity: &IdentityKey,
        snapshot: &ProfileSnapshot,
    ) -> Option<EntityId> {
        let store = self.store.as_ref()?;
        match store.upsert_profile(identity, snapshot).await {
            Ok(record) => Some(record.profile_id),
            Err(e) => {
                self.absorb("upsert_profile", &e);
                None
            }
        }
    }

    async fn lookup(&self, identity: &IdentityKey) -> CacheLookup {
        let Some(store) = &self.store else {
            return CacheLookup::Miss;
        };

        let profile = match store.find_profile(identity).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return CacheLookup::Miss,
            Err(e) => {
                self.absorb("find_profile", &e);
                return CacheLookup::Miss;
            }
        };

        let freshness = assess(profile.updated_at, self.config.cache_expiry, Utc::now());
        if !freshness.is_fresh() {
            tracing::debug!(
                identity = %identity,
                age_secs = freshness.age().as_secs(),
                "Stored profile expired"
            );
            return CacheLookup::Stale;
        }

        match store.latest_analysis(profile.profile_id).await {
            // An analysis older than the snapshot belongs to a previous refresh.
            Ok(Some(analysis)) if analysis.created_at >= profile.updated_at => {
                CacheLookup::Hit(StoredAnalysis { profile, analysis })
            }
            Ok(_) => CacheLookup::ProfileOnly(profile),
            Err(e) => {
                self.absorb("latest_analysis", &e);
                CacheLookup::ProfileOnly(profile)
            }
        }
    }

    fn absorb(&self, operation: &str, err: &StorageError) {
        tracing::warn!(
            operation,
            error = %err,
            "Record store unavailable, continuing without cache"
        );
        if let Some(m) = metrics() {
            m.record_store_error(operation);
        }
    }

    // ========================================================================
    // CACHE MANAGEMENT
    // ========================================================================

    /// Remove the stored profile and its analyses.
    pub async fn clear_cache(&self, raw: &str) -> InsightResult<ClearCacheResponse> {
        let identity = self.normalizer.normalize(raw)?;
        let removed = match &self.store {
            Some(store) => match store.delete(&identity).await {
                Ok(rows) => rows > 0,
                Err(e) => {
                    self.absorb("delete", &e);
                    false
                }
            },
            None => false,
        };

        tracing::info!(identity = %identity, removed, "Cache cleared");
        Ok(ClearCacheResponse {
            identity_key: identity.into_inner(),
            removed,
        })
    }

    /// Whether a profile is stored, without triggering any upstream work.
    pub async fn profile_exists(&self, raw: &str) -> InsightResult<ProfileExistsResponse> {
        let identity = self.normalizer.normalize(raw)?;
        let mut response = ProfileExistsResponse {
            exists: false,
            identity_key: identity.as_str().to_string(),
            cached_at: None,
            profile_id: None,
        };

        let Some(store) = &self.store else {
            return Ok(response);
        };

        match store.find_profile(&identity).await {
            Ok(Some(profile)) => {
                response.exists = true;
                response.profile_id = Some(profile.profile_id);
                match store.latest_analysis(profile.profile_id).await {
                    Ok(analysis) => response.cached_at = analysis.map(|a| a.created_at),
                    Err(e) => self.absorb("latest_analysis", &e),
                }
            }
            Ok(None) => {}
            Err(e) => self.absorb("find_profile", &e),
        }
        Ok(response)
    }

    /// Newest profiles first. `None` uses the configured default page size.
    pub async fn list_profiles(&self, limit: Option<usize>) -> InsightResult<Vec<ProfileSummary>> {
        let limit = limit
            .unwrap_or(self.config.profile_list_limit)
            .clamp(1, MAX_PROFILE_LIST_LIMIT);

        let Some(store) = &self.store else {
            return Ok(Vec::new());
        };
        match store.list_profiles(limit).await {
            Ok(records) => Ok(records.iter().map(ProfileSummary::from).collect()),
            Err(e) => {
                self.absorb("list_profiles", &e);
                Ok(Vec::new())
            }
        }
    }

    // ========================================================================
    // VALIDATION
    // ========================================================================

    /// Check a URL without touching the store or any upstream.
    ///
    /// A missing or blank URL is an error; a malformed one is a normal
    /// response with `valid: false`.
    pub fn validate_url(&self, raw: Option<&str>) -> InsightResult<ValidateUrlResponse> {
        let original = match raw {
            Some(url) if !url.trim().is_empty() => url,
            _ => {
                return Err(ValidationError::RequiredFieldMissing {
                    field: "url".to_string(),
                }
                .into())
            }
        };

        Ok(match self.normalizer.normalize(original) {
            Ok(identity) => ValidateUrlResponse {
                valid: true,
                original_url: original.to_string(),
                sanitized_url: Some(format!("https://{}", identity)),
                error: None,
                message: "URL is a valid profile URL".to_string(),
            },
            Err(e) => ValidateUrlResponse {
                valid: false,
                original_url: original.to_string(),
                sanitized_url: None,
                error: Some(e.to_string()),
                message: "URL is not a valid profile URL".to_string(),
            },
        })
    }

    // ========================================================================
    // HEALTH
    // ========================================================================

    /// Probe the store and collect statistics. Never fails.
    pub async fn health(&self) -> HealthReport {
        let Some(store) = &self.store else {
            return HealthReport {
                store_connected: false,
                store: ComponentHealth::degraded("record store not configured"),
                stats: None,
            };
        };

        let started = Instant::now();
        if let Err(e) = store.ping().await {
            self.absorb("ping", &e);
            return HealthReport {
                store_connected: false,
                store: ComponentHealth::degraded(e.to_string()),
                stats: None,
            };
        }
        let latency_ms = started.elapsed().as_millis() as u64;

        let stats = match store.stats(self.config.stats_window).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                self.absorb("stats", &e);
                None
            }
        };

        HealthReport {
            store_connected: true,
            store: ComponentHealth::healthy().with_latency(latency_ms),
            stats,
        }
    }
}

impl std::fmt::Debug for AnalysisService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisService")
            .field("store", &self.store.is_some())
            .field("acquirer", &self.acquirer)
            .field("provider", &self.generator.provider_name())
            .field("in_flight", &self.flights.len())
            .finish()
    }
}

// ============================================================================
// METRICS HELPERS
// ============================================================================

fn record_cache(outcome: CacheOutcome) {
    if let Some(m) = metrics() {
        m.record_cache_lookup(outcome);
    }
}

fn record_upstream(kind: &str, result: &str) {
    if let Some(m) = metrics() {
        m.record_upstream_call(kind, result);
    }
}

/// Tracks one running pipeline. The in-flight gauge is decremented on drop,
/// so a pipeline cancelled by the timeout is still accounted for.
struct PipelineTimer {
    started: Instant,
}

impl PipelineTimer {
    fn start() -> Self {
        if let Some(m) = metrics() {
            m.pipelines_in_flight.inc();
        }
        Self {
            started: Instant::now(),
        }
    }

    fn finish(&self, result: &str) {
        if let Some(m) = metrics() {
            m.record_pipeline(result, self.started.elapsed().as_secs_f64());
        }
    }
}

impl Drop for PipelineTimer {
    fn drop(&mut self) {
        if let Some(m) = metrics() {
            m.pipelines_in_flight.dec();
        }
    }
}
