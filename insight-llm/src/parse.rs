//! Turning free-form model text into a typed analysis.
//!
//! Strategies run in order and the first that yields an object with a
//! summary wins: the whole text as JSON, the body of a code fence, the first
//! balanced `{...}` span, and finally a degraded result built from the raw
//! text. Parsing never fails.

use insight_core::ParseOutcome;
use serde_json::{Map, Value};

/// Lists are cut to this many entries.
pub const MAX_LIST_ITEMS: usize = 3;

/// Degraded summaries keep at most this many characters of the raw text.
pub const SUMMARY_FALLBACK_CHARS: usize = 500;

const EMPTY_TEXT_SUMMARY: &str = "No analysis text was returned.";

const SUMMARY_KEYS: [&str; 2] = ["summary", "executive_summary"];
const STRENGTH_KEYS: [&str; 2] = ["strengths", "professional_strengths"];
const WEAKNESS_KEYS: [&str; 2] = ["weaknesses", "potential_blind_spots"];

/// Analysis fields recovered from model text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAnalysis {
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub outcome: ParseOutcome,
}

/// Run the parse ladder over raw model text.
pub fn parse_analysis(text: &str) -> ParsedAnalysis {
    let trimmed = text.trim();

    if let Some(parsed) = from_json_text(trimmed, ParseOutcome::Strict) {
        return parsed;
    }
    if let Some(parsed) = fenced_body(trimmed).and_then(|b| from_json_text(b, ParseOutcome::Fenced)) {
        return parsed;
    }
    if let Some(parsed) = embedded_objects(trimmed)
        .into_iter()
        .find_map(|span| from_json_text(span, ParseOutcome::Embedded))
    {
        return parsed;
    }

    tracing::warn!(
        text_len = trimmed.len(),
        "Model output did not contain a usable JSON object, degrading"
    );
    degraded(trimmed)
}

fn from_json_text(text: &str, outcome: ParseOutcome) -> Option<ParsedAnalysis> {
    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;
    let summary = first_string(object, &SUMMARY_KEYS)?;
    Some(ParsedAnalysis {
        summary,
        strengths: string_list(object, &STRENGTH_KEYS),
        weaknesses: string_list(object, &WEAKNESS_KEYS),
        outcome,
    })
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(object: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find_map(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .take(MAX_LIST_ITEMS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Body of the first ``` fence, with an optional language tag dropped.
fn fenced_body(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_ticks = &text[start + 3..];
    let body_start = after_ticks.find('\n').map(|i| i + 1).unwrap_or(0);
    let tag = after_ticks[..body_start].trim();
    if !tag.is_empty() && !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        // The fence opened inline, e.g. ```{"summary": ...}```.
        let end = after_ticks.find("```")?;
        return Some(after_ticks[..end].trim());
    }
    let body = &after_ticks[body_start..];
    let end = body.find("```").unwrap_or(body.len());
    Some(body[..end].trim())
}

/// Every top-level balanced `{...}` span, in order of appearance.
///
/// Braces inside JSON strings are ignored.
fn embedded_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        spans.push(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

fn degraded(trimmed: &str) -> ParsedAnalysis {
    let summary = if trimmed.is_empty() {
        EMPTY_TEXT_SUMMARY.to_string()
    } else {
        truncate_chars(trimmed, SUMMARY_FALLBACK_CHARS).to_string()
    };
    ParsedAnalysis {
        summary,
        strengths: Vec::new(),
        weaknesses: Vec::new(),
        outcome: ParseOutcome::Degraded,
    }
}

/// Longest prefix of at most `max` characters.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_json() {
        let parsed = parse_analysis(
            r#"{"summary":"Analytical leader","strengths":["a","b","c","d"],"weaknesses":["x"]}"#,
        );
        assert_eq!(parsed.outcome, ParseOutcome::Strict);
        assert_eq!(parsed.summary, "Analytical leader");
        assert_eq!(parsed.strengths, vec!["a", "b", "c"]);
        assert_eq!(parsed.weaknesses, vec!["x"]);
    }

    #[test]
    fn test_fenced_json_with_language_tag() {
        let text = "Here you go:\n```json\n{\"summary\": \"Calm\", \"strengths\": [\"s\"], \"weaknesses\": []}\n```\nThanks";
        let parsed = parse_analysis(text);
        assert_eq!(parsed.outcome, ParseOutcome::Fenced);
        assert_eq!(parsed.summary, "Calm");
        assert_eq!(parsed.strengths, vec!["s"]);
        assert!(parsed.weaknesses.is_empty());
    }

    #[test]
    fn test_fenced_json_without_tag() {
        let parsed = parse_analysis("```\n{\"summary\": \"Plain fence\"}\n```");
        assert_eq!(parsed.outcome, ParseOutcome::Fenced);
        assert_eq!(parsed.summary, "Plain fence");
    }

    #[test]
    fn test_embedded_object_in_prose() {
        let text = r#"Sure! The result is {"summary": "Uses {braces} in text", "strengths": ["one"]} hope it helps"#;
        let parsed = parse_analysis(text);
        assert_eq!(parsed.outcome, ParseOutcome::Embedded);
        assert_eq!(parsed.summary, "Uses {braces} in text");
        assert_eq!(parsed.strengths, vec!["one"]);
    }

    #[test]
    fn test_embedded_skips_object_without_summary() {
        let text = r#"{"note": "draft"} then {"summary": "final"}"#;
        let parsed = parse_analysis(text);
        assert_eq!(parsed.outcome, ParseOutcome::Embedded);
        assert_eq!(parsed.summary, "final");
    }

    #[test]
    fn test_aliases_are_accepted() {
        let parsed = parse_analysis(
            r#"{"executive_summary":"Exec","professional_strengths":["p1","p2","p3","p4"],"potential_blind_spots":["b1"]}"#,
        );
        assert_eq!(parsed.outcome, ParseOutcome::Strict);
        assert_eq!(parsed.summary, "Exec");
        assert_eq!(parsed.strengths.len(), 3);
        assert_eq!(parsed.weaknesses, vec!["b1"]);
    }

    #[test]
    fn test_non_string_items_are_skipped() {
        let parsed =
            parse_analysis(r#"{"summary":"S","strengths":[1,"real",null,{"a":1}],"weaknesses":"nope"}"#);
        assert_eq!(parsed.strengths, vec!["real"]);
        assert!(parsed.weaknesses.is_empty());
    }

    #[test]
    fn test_object_without_summary_degrades() {
        let parsed = parse_analysis(r#"{"strengths":["a"]}"#);
        assert_eq!(parsed.outcome, ParseOutcome::Degraded);
        assert_eq!(parsed.summary, r#"{"strengths":["a"]}"#);
        assert!(parsed.strengths.is_empty());
    }

    #[test]
    fn test_prose_degrades_to_truncated_text() {
        let prose = "word ".repeat(300);
        let parsed = parse_analysis(&prose);
        assert_eq!(parsed.outcome, ParseOutcome::Degraded);
        assert_eq!(parsed.summary.chars().count(), SUMMARY_FALLBACK_CHARS);
        assert!(parsed.strengths.is_empty());
        assert!(parsed.weaknesses.is_empty());
    }

    #[test]
    fn test_empty_text_degrades_to_placeholder() {
        let parsed = parse_analysis("   \n ");
        assert_eq!(parsed.outcome, ParseOutcome::Degraded);
        assert_eq!(parsed.summary, EMPTY_TEXT_SUMMARY);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("ab", 5), "ab");
        assert_eq!(truncate_chars("", 3), "");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any input parses, and degraded summaries stay within the cap.
        #[test]
        fn prop_never_panics(text in ".{0,800}") {
            let parsed = parse_analysis(&text);
            prop_assert!(!parsed.summary.is_empty());
            if parsed.outcome == ParseOutcome::Degraded {
                prop_assert!(parsed.summary.chars().count() <= SUMMARY_FALLBACK_CHARS);
                prop_assert!(parsed.strengths.is_empty());
            }
            prop_assert!(parsed.strengths.len() <= MAX_LIST_ITEMS);
            prop_assert!(parsed.weaknesses.len() <= MAX_LIST_ITEMS);
        }

        /// A valid object survives any amount of surrounding prose.
        #[test]
        fn prop_embedded_object_found(prefix in "[a-zA-Z .,!]{0,40}", suffix in "[a-zA-Z .,!]{0,40}") {
            let text = format!("{prefix}{{\"summary\": \"core\", \"strengths\": [\"s\"]}}{suffix}");
            let parsed = parse_analysis(&text);
            prop_assert_eq!(parsed.summary, "core");
            prop_assert!(!parsed.outcome.is_degraded());
        }
    }
}
