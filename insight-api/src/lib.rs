//! InsightProfile API - HTTP Surface and Analysis Orchestrator
//!
//! Axum routes over [`AnalysisService`], which drives profile acquisition
//! and analysis generation behind a Postgres-backed cache. The service keeps
//! answering without a database; every store failure is absorbed and logged.

pub mod config;
pub mod db;
pub mod error;
pub mod macros;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

use std::sync::Arc;

use insight_acquisition::{ProfileAcquirer, ProfileApiClient};
use insight_core::{InsightConfig, LlmConfig, UpstreamConfig};
use insight_llm::{build_provider, AnalysisGenerator};
use insight_storage::RecordStore;

pub use config::ApiConfig;
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use services::{AnalysisService, HealthReport, SingleFlight};
pub use state::AppState;
pub use types::*;

/// Open the record store, or `None` to run degraded.
///
/// A disabled or unreachable database is not fatal.
pub async fn connect_store(config: &DbConfig) -> Option<Arc<dyn RecordStore>> {
    if !config.enabled {
        tracing::warn!("Database disabled, running without a record store");
        return None;
    }
    match DbClient::connect(config).await {
        Ok(client) => {
            tracing::info!(
                host = %config.host,
                dbname = %config.dbname,
                pool_size = config.max_size,
                "Connected to record store"
            );
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(
                host = %config.host,
                error = %e,
                "Database unreachable, running without a record store"
            );
            None
        }
    }
}

/// Wire the production service from environment configuration.
pub async fn build_service_from_env() -> ApiResult<AnalysisService> {
    let insight_config = InsightConfig::from_env();
    let upstream = ProfileApiClient::new(&UpstreamConfig::from_env()?)?;
    let llm_config = LlmConfig::from_env()?;
    let provider = build_provider(&llm_config)?;

    let acquirer = ProfileAcquirer::new(Arc::new(upstream), insight_config.settle_delay);
    let generator = AnalysisGenerator::from_config(provider, &llm_config);
    let store = connect_store(&DbConfig::from_env()).await;

    Ok(AnalysisService::new(insight_config, store, acquirer, generator)?)
}
