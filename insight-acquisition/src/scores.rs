//! Trait score extraction from a fetched profile.

use insight_core::{TraitScores, TRAIT_DIMENSIONS};
use serde_json::Value;

/// Places a dimension map may live, in priority order.
const SCORE_SOURCES: [&str; 2] = [
    "/personality_analysis/big_five",
    "/personality_analysis/ocean_assessment",
];

/// Derive 0-100 trait scores from a profile payload.
///
/// Each dimension is read under its lowercase or capitalized name, as a
/// number, a numeric string, or an object carrying `score`, `value` or
/// `rating`. Fractions in `0..=1` are scaled by 100; everything is clamped.
/// A dimension that cannot be read stays at the midpoint.
pub fn extract_trait_scores(payload: &Value) -> TraitScores {
    let mut scores = TraitScores::neutral();
    let sources: Vec<&Value> = SCORE_SOURCES
        .iter()
        .filter_map(|pointer| payload.pointer(pointer))
        .filter(|v| v.is_object())
        .collect();

    for dimension in TRAIT_DIMENSIONS {
        let value = sources
            .iter()
            .find_map(|source| dimension_value(source, dimension));
        match value {
            Some(raw) => {
                scores.set(dimension, normalize_score(raw));
            }
            None => {
                tracing::debug!(dimension, "Trait dimension missing, using midpoint");
            }
        }
    }

    scores
}

fn dimension_value(source: &Value, dimension: &str) -> Option<f64> {
    let entry = source
        .get(dimension)
        .or_else(|| source.get(capitalize(dimension).as_str()))?;
    match entry {
        Value::Object(map) => ["score", "value", "rating"]
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(as_number),
        other => as_number(other),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn normalize_score(raw: f64) -> f64 {
    if (0.0..=1.0).contains(&raw) {
        raw * 100.0
    } else {
        raw
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Whatever number the upstream sends, the score lands in range.
        #[test]
        fn prop_scores_always_in_range(raw in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
            let payload = json!({"personality_analysis": {"big_five": {"openness": raw}}});
            let scores = extract_trait_scores(&payload);
            prop_assert!((TraitScores::MIN..=TraitScores::MAX).contains(&scores.openness));
        }
    }
}
