//! Freshness policy for stored profiles.
//!
//! A profile is fresh while its age, measured from `updated_at`, is strictly
//! below the configured expiry. Expiry is inclusive: a record exactly
//! `max_age` old is already expired.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome of assessing a stored record against the expiry window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh { age: Duration },
    Expired { age: Duration },
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh { .. })
    }

    pub fn age(&self) -> Duration {
        match self {
            Self::Fresh { age } | Self::Expired { age } => *age,
        }
    }
}

/// Classify a record last updated at `updated_at`.
///
/// Timestamps in the future (clock skew between writers) count as age zero.
pub fn assess(updated_at: DateTime<Utc>, max_age: Duration, now: DateTime<Utc>) -> Freshness {
    let age = (now - updated_at).to_std().unwrap_or(Duration::ZERO);
    if age >= max_age {
        Freshness::Expired { age }
    } else {
        Freshness::Fresh { age }
    }
}

/// Pure freshness predicate over `updated_at`.
pub fn is_fresh(updated_at: DateTime<Utc>, max_age: Duration, now: DateTime<Utc>) -> bool {
    assess(updated_at, max_age, now).is_fresh()
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::TimeDelta;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Fresh exactly when age < max_age, at microsecond resolution.
        #[test]
        fn prop_fresh_iff_younger_than_expiry(
            max_age_us in 1i64..10_000_000_000,
            age_us in 0i64..20_000_000_000,
        ) {
            let now = Utc::now();
            let updated_at = now - TimeDelta::microseconds(age_us);
            let max_age = Duration::from_micros(max_age_us as u64);
            prop_assert_eq!(is_fresh(updated_at, max_age, now), age_us < max_age_us);
        }
    }
}
