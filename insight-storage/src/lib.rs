//! InsightProfile Storage - Record Store Trait and In-Memory Implementation
//!
//! Defines the narrow CRUD surface the orchestrator caches through, the
//! freshness policy applied to stored profiles, and an in-memory store.
//! The Postgres implementation lives in insight-api.

pub mod freshness;
pub mod memory;
pub mod record_store;

pub use freshness::{assess, is_fresh, Freshness};
pub use memory::InMemoryRecordStore;
pub use record_store::RecordStore;
