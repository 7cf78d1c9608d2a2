//! Persisted entities and pipeline value types

use crate::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// TRAIT SCORES
// ============================================================================

/// The five personality dimensions read from every profile.
pub const TRAIT_DIMENSIONS: [&str; 5] = [
    "openness",
    "conscientiousness",
    "extraversion",
    "agreeableness",
    "neuroticism",
];

/// Normalized 0-100 scores for the five personality dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TraitScores {
    pub openness: f64,
    pub conscientiousness: f64,
    pub extraversion: f64,
    pub agreeableness: f64,
    pub neuroticism: f64,
}

impl TraitScores {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 100.0;
    /// Value used for dimensions the upstream did not report.
    pub const MIDPOINT: f64 = 50.0;

    /// All dimensions at the midpoint.
    pub fn neutral() -> Self {
        Self {
            openness: Self::MIDPOINT,
            conscientiousness: Self::MIDPOINT,
            extraversion: Self::MIDPOINT,
            agreeableness: Self::MIDPOINT,
            neuroticism: Self::MIDPOINT,
        }
    }

    /// Clamp into range; NaN becomes the midpoint.
    pub fn clamp_score(value: f64) -> f64 {
        if value.is_nan() {
            Self::MIDPOINT
        } else {
            value.clamp(Self::MIN, Self::MAX)
        }
    }

    pub fn get(&self, dimension: &str) -> Option<f64> {
        match dimension {
            "openness" => Some(self.openness),
            "conscientiousness" => Some(self.conscientiousness),
            "extraversion" => Some(self.extraversion),
            "agreeableness" => Some(self.agreeableness),
            "neuroticism" => Some(self.neuroticism),
            _ => None,
        }
    }

    /// Set a dimension, clamping the value. Returns false for unknown names.
    pub fn set(&mut self, dimension: &str, value: f64) -> bool {
        let slot = match dimension {
            "openness" => &mut self.openness,
            "conscientiousness" => &mut self.conscientiousness,
            "extraversion" => &mut self.extraversion,
            "agreeableness" => &mut self.agreeableness,
            "neuroticism" => &mut self.neuroticism,
            _ => return false,
        };
        *slot = Self::clamp_score(value);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        TRAIT_DIMENSIONS
            .iter()
            .map(move |d| (*d, self.get(d).unwrap_or(Self::MIDPOINT)))
    }
}

impl Default for TraitScores {
    fn default() -> Self {
        Self::neutral()
    }
}

// ============================================================================
// PROFILE
// ============================================================================

/// Result of a successful two-phase acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Opaque id returned by the upstream create call.
    pub external_id: String,
    pub raw_payload: Value,
    pub trait_scores: TraitScores,
}

/// One row per distinct identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub profile_id: EntityId,
    pub identity_key: String,
    pub external_id: String,
    pub raw_payload: Value,
    pub trait_scores: TraitScores,
    pub created_at: Timestamp,
    /// Advances on every refresh; drives freshness.
    pub updated_at: Timestamp,
}

impl ProfileRecord {
    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            external_id: self.external_id.clone(),
            raw_payload: self.raw_payload.clone(),
            trait_scores: self.trait_scores,
        }
    }
}

// ============================================================================
// ANALYSIS
// ============================================================================

/// Which rung of the parse ladder produced an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ParseOutcome {
    /// The whole output was a valid JSON object.
    Strict,
    /// Valid JSON once markdown code fences were removed.
    Fenced,
    /// A balanced JSON object was found inside surrounding prose.
    Embedded,
    /// No usable JSON; summary is a prefix of the raw text.
    Degraded,
}

impl ParseOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ParseOutcome::Degraded)
    }
}

/// Typed output of the analysis generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    /// Raw model text plus parse diagnostics.
    pub raw_response: Value,
    pub outcome: ParseOutcome,
}

/// Analysis row, owned by exactly one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub analysis_id: EntityId,
    pub profile_id: EntityId,
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub raw_response: Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A profile paired with its most recent analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAnalysis {
    pub profile: ProfileRecord,
    pub analysis: AnalysisRecord,
}

// ============================================================================
// RESPONSE
// ============================================================================

/// The three fields callers see from an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnalysisBody {
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

impl From<&AnalysisRecord> for AnalysisBody {
    fn from(record: &AnalysisRecord) -> Self {
        Self {
            summary: record.summary.clone(),
            strengths: record.strengths.clone(),
            weaknesses: record.weaknesses.clone(),
        }
    }
}

impl From<&AnalysisResult> for AnalysisBody {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            summary: result.summary.clone(),
            strengths: result.strengths.clone(),
            weaknesses: result.weaknesses.clone(),
        }
    }
}

/// Response of `analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AnalysisResponse {
    pub analysis: AnalysisBody,
    pub trait_scores: TraitScores,
    /// True when served from the record store without upstream work.
    pub cached: bool,
    /// Creation time of the served analysis; only set on cache hits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub cached_at: Option<Timestamp>,
}

impl AnalysisResponse {
    pub fn from_cache(stored: &StoredAnalysis) -> Self {
        Self {
            analysis: AnalysisBody::from(&stored.analysis),
            trait_scores: stored.profile.trait_scores,
            cached: true,
            cached_at: Some(stored.analysis.created_at),
        }
    }

    pub fn computed(trait_scores: TraitScores, result: &AnalysisResult) -> Self {
        Self {
            analysis: AnalysisBody::from(result),
            trait_scores,
            cached: false,
            cached_at: None,
        }
    }
}

/// Aggregate counters reported by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoreStats {
    pub total_profiles: u64,
    pub total_analyses: u64,
    /// Profiles created within the trailing window.
    pub recent_profiles: u64,
    pub window_days: i64,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub generated_at: Timestamp,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            summary: "Decisive and curious.".to_string(),
            strengths: vec!["a".into(), "b".into(), "c".into()],
            weaknesses: vec!["x".into()],
            raw_response: json!({"text": "{}"}),
            outcome: ParseOutcome::Strict,
        }
    }

    #[test]
    fn test_trait_scores_neutral_is_midpoint() {
        let scores = TraitScores::neutral();
        assert!(scores.iter().all(|(_, v)| v == TraitScores::MIDPOINT));
        assert_eq!(scores, TraitScores::default());
    }

    #[test]
    fn test_trait_scores_set_clamps() {
        let mut scores = TraitScores::neutral();
        assert!(scores.set("openness", 140.0));
        assert!(scores.set("neuroticism", -3.0));
        assert!(scores.set("agreeableness", f64::NAN));
        assert!(!scores.set("charisma", 10.0));
        assert_eq!(scores.openness, 100.0);
        assert_eq!(scores.neuroticism, 0.0);
        assert_eq!(scores.agreeableness, 50.0);
    }

    #[test]
    fn test_trait_scores_iter_follows_dimension_order() {
        let names: Vec<_> = TraitScores::neutral().iter().map(|(n, _)| n).collect();
        assert_eq!(names, TRAIT_DIMENSIONS.to_vec());
    }

    #[test]
    fn test_trait_scores_serialize_by_name() {
        let mut scores = TraitScores::neutral();
        scores.set("openness", 72.0);
        let value = serde_json::to_value(scores).unwrap();
        assert_eq!(value["openness"], json!(72.0));
        assert_eq!(value["neuroticism"], json!(50.0));
    }

    #[test]
    fn test_computed_response_has_no_cached_at() {
        let response = AnalysisResponse::computed(TraitScores::neutral(), &sample_result());
        assert!(!response.cached);
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("cached_at").is_none());
        assert_eq!(value["analysis"]["strengths"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_cached_response_uses_analysis_creation_time() {
        let now = Utc::now();
        let profile = ProfileRecord {
            profile_id: crate::new_entity_id(),
            identity_key: "linkedin.com/in/jdoe".to_string(),
            external_id: "u1".to_string(),
            raw_payload: json!({}),
            trait_scores: TraitScores::neutral(),
            created_at: now,
            updated_at: now,
        };
        let analysis = AnalysisRecord {
            analysis_id: crate::new_entity_id(),
            profile_id: profile.profile_id,
            summary: "s".to_string(),
            strengths: vec![],
            weaknesses: vec![],
            raw_response: json!(null),
            created_at: now - chrono::Duration::hours(1),
            updated_at: now,
        };
        let stored = StoredAnalysis { profile, analysis };
        let response = AnalysisResponse::from_cache(&stored);
        assert!(response.cached);
        assert_eq!(response.cached_at, Some(stored.analysis.created_at));
    }

    #[test]
    fn test_parse_outcome_tags() {
        assert_eq!(
            serde_json::to_value(ParseOutcome::Embedded).unwrap(),
            json!("embedded")
        );
        assert!(ParseOutcome::Degraded.is_degraded());
        assert!(!ParseOutcome::Fenced.is_degraded());
    }
}
