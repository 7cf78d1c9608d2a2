//! Profile upstream trait.

use async_trait::async_trait;
use insight_core::{AcquisitionError, IdentityKey};
use serde_json::Value;

/// The two calls the profile upstream exposes.
///
/// Implementations perform exactly one attempt per call; retrying is never
/// their job.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Start building a profile for `identity`.
    ///
    /// # Returns
    /// * `Ok(String)` - Opaque external id to fetch with later
    /// * `Err(AcquisitionError)` - With `stage` set to create
    async fn create(&self, identity: &IdentityKey) -> Result<String, AcquisitionError>;

    /// Fetch the finished profile for `external_id`.
    ///
    /// # Returns
    /// * `Ok(Value)` - Profile payload, opaque beyond the trait dimensions
    /// * `Err(AcquisitionError)` - With `stage` set to fetch
    async fn fetch(&self, external_id: &str) -> Result<Value, AcquisitionError>;

    /// Short name used in logs and metrics.
    fn source_name(&self) -> &str;
}
