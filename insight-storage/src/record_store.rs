//! Async record store trait.

use ::async_trait::async_trait;
use insight_core::{
    AnalysisRecord, AnalysisResult, EntityId, IdentityKey, ProfileRecord, ProfileSnapshot,
    StorageError, StoreStats, StoredAnalysis,
};
use std::time::Duration;

/// Typed CRUD over profiles and their analyses.
///
/// Absence is `Ok(None)`, never an error. Every method may fail with a
/// [`StorageError`], which callers treat as the store being unavailable.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ========================================================================
    // READS
    // ========================================================================

    /// A profile together with its most recent analysis.
    ///
    /// Returns `None` unless both exist.
    async fn find(&self, key: &IdentityKey) -> Result<Option<StoredAnalysis>, StorageError> {
        let Some(profile) = self.find_profile(key).await? else {
            return Ok(None);
        };
        Ok(self
            .latest_analysis(profile.profile_id)
            .await?
            .map(|analysis| StoredAnalysis { profile, analysis }))
    }

    /// The profile row alone.
    async fn find_profile(&self, key: &IdentityKey) -> Result<Option<ProfileRecord>, StorageError>;

    /// Most recent analysis owned by `profile_id`.
    async fn latest_analysis(
        &self,
        profile_id: EntityId,
    ) -> Result<Option<AnalysisRecord>, StorageError>;

    /// Newest profiles first.
    async fn list_profiles(&self, limit: usize) -> Result<Vec<ProfileRecord>, StorageError>;

    /// Totals plus profiles created within `window`.
    async fn stats(&self, window: Duration) -> Result<StoreStats, StorageError>;

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Insert the profile, or replace its external id, payload and scores in
    /// place and advance `updated_at`.
    async fn upsert_profile(
        &self,
        key: &IdentityKey,
        snapshot: &ProfileSnapshot,
    ) -> Result<ProfileRecord, StorageError>;

    /// Append an analysis to an existing profile.
    async fn insert_analysis(
        &self,
        profile_id: EntityId,
        result: &AnalysisResult,
    ) -> Result<AnalysisRecord, StorageError>;

    /// Remove the profile and every analysis it owns. Returns rows removed.
    async fn delete(&self, key: &IdentityKey) -> Result<u64, StorageError>;

    // ========================================================================
    // HEALTH
    // ========================================================================

    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<(), StorageError>;
}
