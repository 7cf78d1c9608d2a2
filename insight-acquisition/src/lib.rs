//! InsightProfile Acquisition - Two-Phase Profile Upstream
//!
//! The upstream builds a behavioral profile asynchronously: a create call
//! starts the work and returns an opaque id, and a fetch call keyed by that
//! id returns the finished profile once the settle delay has passed.
//!
//! This crate provides the [`ProfileSource`] seam over that upstream, the
//! reqwest-backed [`ProfileApiClient`], the status-to-category mapping, trait
//! score extraction and the [`ProfileAcquirer`] that sequences the phases.

pub mod acquirer;
pub mod client;
pub mod payload;
pub mod scores;
pub mod source;
pub mod status;

pub use acquirer::ProfileAcquirer;
pub use client::ProfileApiClient;
pub use payload::{extract_external_id, is_incomplete, select_profile_payload};
pub use scores::extract_trait_scores;
pub use source::ProfileSource;
pub use status::{category_for_status, upstream_error_message};
