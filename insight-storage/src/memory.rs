//! In-memory record store.
//!
//! Used when no database is configured and as the reference implementation
//! in tests. Mirrors the Postgres semantics: unique identity keys, in-place
//! refresh, cascading delete, and no orphan analyses.

use crate::RecordStore;
use ::async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use insight_core::{
    new_entity_id, AnalysisRecord, AnalysisResult, EntityId, IdentityKey, ProfileRecord,
    ProfileSnapshot, StorageError, StoreStats, Timestamp,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

type ProfileMap = HashMap<String, ProfileRecord>;
type AnalysisMap = HashMap<EntityId, Vec<AnalysisRecord>>;

/// Thread-safe in-memory store. Clones share the same data.
///
/// Lock order is always profiles, then analyses.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    profiles: Arc<RwLock<ProfileMap>>,
    analyses: Arc<RwLock<AnalysisMap>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn analysis_count(&self) -> usize {
        self.analyses
            .read()
            .map(|a| a.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Overwrite a profile's `updated_at`. Returns false if it does not exist.
    ///
    /// Lets callers age records without waiting on the wall clock.
    pub fn set_updated_at(
        &self,
        key: &IdentityKey,
        updated_at: Timestamp,
    ) -> Result<bool, StorageError> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(match profiles.get_mut(key.as_str()) {
            Some(profile) => {
                profile.updated_at = updated_at;
                true
            }
            None => false,
        })
    }

    /// Drop everything.
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let mut analyses = self
            .analyses
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        profiles.clear();
        analyses.clear();
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_profile(&self, key: &IdentityKey) -> Result<Option<ProfileRecord>, StorageError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(profiles.get(key.as_str()).cloned())
    }

    async fn latest_analysis(
        &self,
        profile_id: EntityId,
    ) -> Result<Option<AnalysisRecord>, StorageError> {
        let analyses = self
            .analyses
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(analyses
            .get(&profile_id)
            .and_then(|history| history.iter().max_by_key(|a| a.created_at))
            .cloned())
    }

    async fn list_profiles(&self, limit: usize) -> Result<Vec<ProfileRecord>, StorageError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let mut listed: Vec<ProfileRecord> = profiles.values().cloned().collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed.truncate(limit);
        Ok(listed)
    }

    async fn stats(&self, window: Duration) -> Result<StoreStats, StorageError> {
        let now = Utc::now();
        let window_delta =
            TimeDelta::from_std(window).map_err(|e| StorageError::Serialization {
                field: "window".to_string(),
                reason: e.to_string(),
            })?;
        let cutoff = now - window_delta;

        let profiles = self
            .profiles
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        let analyses = self
            .analyses
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;

        Ok(StoreStats {
            total_profiles: profiles.len() as u64,
            total_analyses: analyses.values().map(Vec::len).sum::<usize>() as u64,
            recent_profiles: profiles.values().filter(|p| p.created_at >= cutoff).count() as u64,
            window_days: window_delta.num_days(),
            generated_at: now,
        })
    }

    async fn upsert_profile(
        &self,
        key: &IdentityKey,
        snapshot: &ProfileSnapshot,
    ) -> Result<ProfileRecord, StorageError> {
        let now = Utc::now();
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;

        let record = profiles
            .entry(key.as_str().to_string())
            .and_modify(|existing| {
                existing.external_id = snapshot.external_id.clone();
                existing.raw_payload = snapshot.raw_payload.clone();
                existing.trait_scores = snapshot.trait_scores;
                existing.updated_at = now;
            })
            .or_insert_with(|| ProfileRecord {
                profile_id: new_entity_id(),
                identity_key: key.as_str().to_string(),
                external_id: snapshot.external_id.clone(),
                raw_payload: snapshot.raw_payload.clone(),
                trait_scores: snapshot.trait_scores,
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn insert_analysis(
        &self,
        profile_id: EntityId,
        result: &AnalysisResult,
    ) -> Result<AnalysisRecord, StorageError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        if !profiles.values().any(|p| p.profile_id == profile_id) {
            return Err(StorageError::IntegrityViolation {
                reason: format!("analysis references unknown profile {}", profile_id),
            });
        }

        let now = Utc::now();
        let record = AnalysisRecord {
            analysis_id: new_entity_id(),
            profile_id,
            summary: result.summary.clone(),
            strengths: result.strengths.clone(),
            weaknesses: result.weaknesses.clone(),
            raw_response: result.raw_response.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut analyses = self
            .analyses
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        analyses.entry(profile_id).or_default().push(record.clone());
        Ok(record)
    }

    async fn delete(&self, key: &IdentityKey) -> Result<u64, StorageError> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let Some(removed) = profiles.remove(key.as_str()) else {
            return Ok(0);
        };
        let mut analyses = self
            .analyses
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        analyses.remove(&removed.profile_id);
        Ok(1)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.profiles
            .read()
            .map(|_| ())
            .map_err(|_| StorageError::LockPoisoned)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::{IdentityNormalizer, ParseOutcome, TraitScores};
    use serde_json::json;

    fn key(handle: &str) -> IdentityKey {
        IdentityNormalizer::permissive()
            .unwrap()
            .normalize(&format!("acme.example/in/{handle}"))
            .unwrap()
    }

    fn snapshot(external_id: &str, openness: f64) -> ProfileSnapshot {
        let mut trait_scores = TraitScores::neutral();
        trait_scores.set("openness", openness);
        ProfileSnapshot {
            external_id: external_id.to_string(),
            raw_payload: json!({"external_id": external_id}),
            trait_scores,
        }
    }

    fn result(summary: &str) -> AnalysisResult {
        AnalysisResult {
            summary: summary.to_string(),
            strengths: vec!["focus".to_string()],
            weaknesses: vec![],
            raw_response: json!({"text": summary}),
            outcome: ParseOutcome::Strict,
        }
    }

    #[tokio::test]
    async fn test_find_requires_profile_and_analysis() {
        let store = InMemoryRecordStore::new();
        let k = key("jdoe");
        assert!(store.find(&k).await.unwrap().is_none());

        let profile = store.upsert_profile(&k, &snapshot("u1", 72.0)).await.unwrap();
        assert!(store.find(&k).await.unwrap().is_none());
        assert!(store.find_profile(&k).await.unwrap().is_some());

        store.insert_analysis(profile.profile_id, &result("first")).await.unwrap();
        let stored = store.find(&k).await.unwrap().unwrap();
        assert_eq!(stored.profile.external_id, "u1");
        assert_eq!(stored.analysis.summary, "first");
    }

    #[tokio::test]
    async fn test_upsert_refreshes_in_place() {
        let store = InMemoryRecordStore::new();
        let k = key("jdoe");
        let first = store.upsert_profile(&k, &snapshot("u1", 72.0)).await.unwrap();
        let second = store.upsert_profile(&k, &snapshot("u2", 10.0)).await.unwrap();

        assert_eq!(store.profile_count(), 1);
        assert_eq!(first.profile_id, second.profile_id);
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.external_id, "u2");
        assert_eq!(second.trait_scores.openness, 10.0);
    }

    #[tokio::test]
    async fn test_latest_analysis_wins() {
        let store = InMemoryRecordStore::new();
        let k = key("jdoe");
        let profile = store.upsert_profile(&k, &snapshot("u1", 72.0)).await.unwrap();
        store.insert_analysis(profile.profile_id, &result("old")).await.unwrap();
        store.insert_analysis(profile.profile_id, &result("new")).await.unwrap();

        let stored = store.find(&k).await.unwrap().unwrap();
        assert_eq!(stored.analysis.summary, "new");
        assert_eq!(store.analysis_count(), 2);
    }

    #[tokio::test]
    async fn test_orphan_analysis_rejected() {
        let store = InMemoryRecordStore::new();
        let err = store
            .insert_analysis(new_entity_id(), &result("orphan"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::IntegrityViolation { .. }));
        assert_eq!(store.analysis_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = InMemoryRecordStore::new();
        let k = key("jdoe");
        let profile = store.upsert_profile(&k, &snapshot("u1", 72.0)).await.unwrap();
        store.insert_analysis(profile.profile_id, &result("a")).await.unwrap();

        assert_eq!(store.delete(&k).await.unwrap(), 1);
        assert_eq!(store.delete(&k).await.unwrap(), 0);
        assert_eq!(store.profile_count(), 0);
        assert_eq!(store.analysis_count(), 0);
        assert!(store.latest_analysis(profile.profile_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_and_listing() {
        let store = InMemoryRecordStore::new();
        for handle in ["a", "b", "c"] {
            let profile = store
                .upsert_profile(&key(handle), &snapshot(handle, 50.0))
                .await
                .unwrap();
            store.insert_analysis(profile.profile_id, &result(handle)).await.unwrap();
        }

        let stats = store.stats(Duration::from_secs(7 * 86_400)).await.unwrap();
        assert_eq!(stats.total_profiles, 3);
        assert_eq!(stats.total_analyses, 3);
        assert_eq!(stats.recent_profiles, 3);
        assert_eq!(stats.window_days, 7);

        let listed = store.list_profiles(2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at >= listed[1].created_at);
    }

    #[tokio::test]
    async fn test_set_updated_at_backdates() {
        let store = InMemoryRecordStore::new();
        let k = key("jdoe");
        store.upsert_profile(&k, &snapshot("u1", 72.0)).await.unwrap();
        let old = Utc::now() - TimeDelta::days(31);
        assert!(store.set_updated_at(&k, old).unwrap());
        assert_eq!(store.find_profile(&k).await.unwrap().unwrap().updated_at, old);
        assert!(!store.set_updated_at(&key("ghost"), old).unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = InMemoryRecordStore::new();
        let clone = store.clone();
        store.upsert_profile(&key("jdoe"), &snapshot("u1", 72.0)).await.unwrap();
        assert_eq!(clone.profile_count(), 1);
        assert!(clone.ping().await.is_ok());
        clone.clear().unwrap();
        assert_eq!(store.profile_count(), 0);
    }
}
