//! Upstream status codes to error categories.

use insight_core::ErrorCategory;
use serde_json::Value;

/// Map a non-success upstream status to a category.
///
/// Anything not listed, including every 5xx, is `upstream_internal`.
pub fn category_for_status(status: u16) -> ErrorCategory {
    match status {
        400 | 422 => ErrorCategory::InvalidInput,
        401 | 403 => ErrorCategory::AuthFailure,
        402 | 429 => ErrorCategory::RateLimited,
        404 | 409 | 425 => ErrorCategory::ProcessingIncomplete,
        _ => ErrorCategory::UpstreamInternal,
    }
}

/// Best human-readable message from an error body.
///
/// Prefers `message`, then `error` (string or `{message}`), then a generic
/// text naming the status.
pub fn upstream_error_message(body: &str, status: u16) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            non_empty_str(v.get("message")).or_else(|| match v.get("error") {
                Some(Value::Object(_)) => non_empty_str(v.pointer("/error/message")),
                other => non_empty_str(other),
            })
        })
        .unwrap_or_else(|| format!("Profile API error (status {})", status))
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bands() {
        assert_eq!(category_for_status(400), ErrorCategory::InvalidInput);
        assert_eq!(category_for_status(422), ErrorCategory::InvalidInput);
        assert_eq!(category_for_status(401), ErrorCategory::AuthFailure);
        assert_eq!(category_for_status(403), ErrorCategory::AuthFailure);
        assert_eq!(category_for_status(402), ErrorCategory::RateLimited);
        assert_eq!(category_for_status(429), ErrorCategory::RateLimited);
        assert_eq!(category_for_status(404), ErrorCategory::ProcessingIncomplete);
        assert_eq!(category_for_status(425), ErrorCategory::ProcessingIncomplete);
        assert_eq!(category_for_status(500), ErrorCategory::UpstreamInternal);
        assert_eq!(category_for_status(503), ErrorCategory::UpstreamInternal);
    }

    #[test]
    fn test_unrecognized_codes_fall_back() {
        for status in [418, 451, 302, 0, 999] {
            assert_eq!(category_for_status(status), ErrorCategory::UpstreamInternal);
        }
    }

    #[test]
    fn test_error_message_preference() {
        assert_eq!(
            upstream_error_message(r#"{"message":"bad id","error":"x"}"#, 400),
            "bad id"
        );
        assert_eq!(upstream_error_message(r#"{"error":"no credits"}"#, 402), "no credits");
        assert_eq!(
            upstream_error_message(r#"{"error":{"message":"nested"}}"#, 500),
            "nested"
        );
        assert_eq!(
            upstream_error_message("<html>oops</html>", 502),
            "Profile API error (status 502)"
        );
        assert_eq!(
            upstream_error_message(r#"{"message":"  "}"#, 500),
            "Profile API error (status 500)"
        );
    }
}
