//! Reading the upstream's response envelopes.
//!
//! The create call answers in one of two shapes depending on whether the
//! profile already existed; the fetch call nests the profile under `data`,
//! under `results`, or not at all.

use serde_json::Value;

const EXTERNAL_ID_POINTERS: [&str; 4] = [
    "/metadata/results/userid",
    "/metadata/results/username",
    "/results/userid",
    "/results/username",
];

/// Opaque id from a create response, or `None` if absent.
pub fn extract_external_id(body: &Value) -> Option<String> {
    EXTERNAL_ID_POINTERS
        .iter()
        .filter_map(|pointer| body.pointer(pointer))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Pick the profile object out of a fetch response.
///
/// `data` wins when it carries `personality_analysis`; otherwise `results`,
/// with `metadata.personality_analysis` grafted in when it lives there;
/// otherwise the whole body.
pub fn select_profile_payload(body: Value) -> Value {
    if has_analysis(body.get("data")) {
        if let Some(data) = body.get("data") {
            return data.clone();
        }
    }

    if let Some(Value::Object(results)) = body.get("results") {
        let mut results = results.clone();
        if !has_analysis_map(&results) {
            match body.pointer("/metadata/personality_analysis") {
                Some(analysis) if !analysis.is_null() => {
                    results.insert("personality_analysis".to_string(), analysis.clone());
                }
                _ => return body,
            }
        }
        return Value::Object(results);
    }

    body
}

/// True when a fetch payload is not yet usable: not an object, or empty.
pub fn is_incomplete(payload: &Value) -> bool {
    match payload {
        Value::Object(map) => map.is_empty(),
        _ => true,
    }
}

fn has_analysis(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Object(map)) if has_analysis_map(map))
}

fn has_analysis_map(map: &serde_json::Map<String, Value>) -> bool {
    map.get("personality_analysis")
        .is_some_and(|v| !v.is_null() && v.as_object().map_or(true, |o| !o.is_empty()))
}
