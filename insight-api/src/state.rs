//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use crate::services::AnalysisService;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnalysisService>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<AnalysisService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

crate::impl_from_ref!(Arc<AnalysisService>, service);
crate::impl_from_ref!(Instant, start_time);
