//! Identity types and profile URL normalization

use crate::{ConfigError, ValidationError};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Host accepted when no allow list is configured explicitly.
pub const DEFAULT_ALLOWED_HOST: &str = "linkedin.com";

const HANDLE_PATTERN: &str = r"^([A-Za-z0-9_-]+)(?:/.*)?$";

// ============================================================================
// IDENTITY KEY
// ============================================================================

/// Canonical identity of an analysis subject, `{host}/in/{handle}`.
///
/// Only [`IdentityNormalizer`] can build one, so holding a key means the
/// string has already been canonicalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The profile handle, i.e. the final path segment.
    pub fn handle(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Host part of the key.
    pub fn host(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdentityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Turns user-supplied profile URLs into [`IdentityKey`]s.
///
/// Scheme, scheme case, a `www.` prefix, trailing slashes, query strings and
/// fragments are insignificant. The handle keeps its case.
#[derive(Debug, Clone)]
pub struct IdentityNormalizer {
    allowed_hosts: Vec<String>,
    handle_pattern: Regex,
}

impl IdentityNormalizer {
    /// Build a normalizer restricted to `allowed_hosts`.
    ///
    /// An empty list accepts any syntactically valid host. Subdomains of an
    /// allowed host (for example `in.linkedin.com`) fold onto that host.
    pub fn new<I, S>(allowed_hosts: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_hosts = allowed_hosts
            .into_iter()
            .map(|h| canonical_host_form(h.as_ref()))
            .filter(|h| !h.is_empty())
            .collect();
        let handle_pattern = Regex::new(HANDLE_PATTERN).map_err(|e| ConfigError::InvalidValue {
            field: "handle_pattern".to_string(),
            value: HANDLE_PATTERN.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            allowed_hosts,
            handle_pattern,
        })
    }

    /// Normalizer that accepts any host.
    pub fn permissive() -> Result<Self, ConfigError> {
        Self::new(Vec::<String>::new())
    }

    pub fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }

    /// Canonicalize a raw identity string.
    pub fn normalize(&self, raw: &str) -> Result<IdentityKey, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "url".to_string(),
            });
        }

        let without_scheme = strip_scheme(trimmed)?;
        let without_suffix = without_scheme
            .split(['?', '#'])
            .next()
            .unwrap_or_default();

        let (authority, path) = match without_suffix.find('/') {
            Some(idx) => (&without_suffix[..idx], &without_suffix[idx + 1..]),
            None => (without_suffix, ""),
        };

        let host = canonical_host_form(strip_userinfo_and_port(authority));
        if !is_valid_host(&host) {
            return Err(ValidationError::InvalidValue {
                field: "url".to_string(),
                reason: format!("'{}' is not a valid host", authority),
            });
        }
        let host = self.resolve_host(host)?;

        let path = path.trim_matches('/');
        let path = match path.strip_prefix("in/") {
            Some(rest) => rest,
            None if path == "in" => "",
            None => path,
        };
        let handle = self
            .handle_pattern
            .captures(path)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| ValidationError::MissingHandle {
                input: trimmed.to_string(),
            })?;

        Ok(IdentityKey(format!("{}/in/{}", host, handle)))
    }

    /// True when both inputs normalize to the same key.
    pub fn same_identity(&self, a: &str, b: &str) -> bool {
        match (self.normalize(a), self.normalize(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn resolve_host(&self, host: String) -> Result<String, ValidationError> {
        if self.allowed_hosts.is_empty() {
            return Ok(host);
        }
        self.allowed_hosts
            .iter()
            .find(|allowed| {
                host == **allowed
                    || host
                        .strip_suffix(allowed.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .cloned()
            .ok_or(ValidationError::UnsupportedHost { host })
    }
}

fn strip_scheme(input: &str) -> Result<&str, ValidationError> {
    match input.find("://") {
        Some(idx) => {
            let scheme = &input[..idx];
            if scheme.eq_ignore_ascii_case("https") || scheme.eq_ignore_ascii_case("http") {
                Ok(&input[idx + 3..])
            } else {
                Err(ValidationError::InvalidValue {
                    field: "url".to_string(),
                    reason: format!("unsupported scheme '{}'", scheme),
                })
            }
        }
        None => Ok(input),
    }
}

fn strip_userinfo_and_port(authority: &str) -> &str {
    let host = authority.rsplit('@').next().unwrap_or(authority);
    host.split(':').next().unwrap_or(host)
}

fn canonical_host_form(host: &str) -> String {
    let lowered = host.trim().trim_end_matches('.').to_ascii_lowercase();
    match lowered.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

fn is_valid_host(host: &str) -> bool {
    host.contains('.')
        && host.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Decorating a URL with insignificant parts never changes its key.
        #[test]
        fn prop_decorations_do_not_change_key(
            handle in "[A-Za-z0-9_-]{1,30}",
            upper_scheme in any::<bool>(),
            www in any::<bool>(),
            trailing_slash in any::<bool>(),
            query in proptest::option::of("[a-z]{1,8}=[a-z0-9]{1,8}"),
        ) {
            let n = IdentityNormalizer::new([DEFAULT_ALLOWED_HOST]).unwrap();
            let scheme = if upper_scheme { "HTTPS://" } else { "https://" };
            let host = if www { "www.linkedin.com" } else { "linkedin.com" };
            let slash = if trailing_slash { "/" } else { "" };
            let suffix = query.map(|q| format!("?{q}")).unwrap_or_default();
            let decorated = format!("{scheme}{host}/in/{handle}{slash}{suffix}");

            let key = n.normalize(&decorated).unwrap();
            prop_assert_eq!(key.as_str(), format!("linkedin.com/in/{handle}"));
        }

        /// Normalizing a key's own text is a fixed point.
        #[test]
        fn prop_normalize_is_idempotent(handle in "[A-Za-z0-9_-]{1,30}") {
            let n = IdentityNormalizer::permissive().unwrap();
            let first = n.normalize(&format!("https://acme.example/in/{handle}/")).unwrap();
            let second = n.normalize(first.as_str()).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
