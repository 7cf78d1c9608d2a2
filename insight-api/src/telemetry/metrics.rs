//! Prometheus metrics for the HTTP surface and the analysis pipeline
//!
//! All InsightProfile metrics, registered once with the default registry and
//! exposed at `/metrics`.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge, CounterVec, Encoder,
    HistogramVec, IntGauge, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
    120.0,
];

/// Pipeline duration buckets (seconds). The settle delay alone is ~35s.
const PIPELINE_LATENCY_BUCKETS: &[f64] = &[1.0, 5.0, 15.0, 30.0, 40.0, 60.0, 90.0, 120.0, 180.0];

/// Global metrics instance - initialized on first use
pub static METRICS: Lazy<ApiResult<InsightMetrics>> = Lazy::new(InsightMetrics::new);

/// The registered metrics, if registration succeeded.
pub fn metrics() -> Option<&'static InsightMetrics> {
    METRICS.as_ref().ok()
}

/// How a cache lookup resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
    Stale,
    Bypass,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
            CacheOutcome::Stale => "stale",
            CacheOutcome::Bypass => "bypass",
        }
    }
}

/// Container for all InsightProfile metrics.
#[derive(Clone)]
pub struct InsightMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Cache lookups - labels: outcome (hit, miss, stale, bypass)
    pub cache_lookups_total: CounterVec,

    /// Upstream calls - labels: kind (acquisition, generation), result
    pub upstream_calls_total: CounterVec,

    /// Full acquire-and-generate pipeline duration - labels: result
    pub pipeline_duration_seconds: HistogramVec,

    /// Absorbed store failures - labels: operation
    pub store_errors_total: CounterVec,

    /// Pipelines currently running
    pub pipelines_in_flight: IntGauge,
}

impl InsightMetrics {
    /// Register every metric in the default registry.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "insight_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "insight_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            cache_lookups_total: register_counter_vec!(
                "insight_cache_lookups_total",
                "Analysis cache lookups by outcome",
                &["outcome"]
            )
            .map_err(|e| registration_error("cache_lookups_total", e))?,

            upstream_calls_total: register_counter_vec!(
                "insight_upstream_calls_total",
                "Upstream calls by kind and result",
                &["kind", "result"]
            )
            .map_err(|e| registration_error("upstream_calls_total", e))?,

            pipeline_duration_seconds: register_histogram_vec!(
                "insight_pipeline_duration_seconds",
                "Acquisition and generation pipeline duration in seconds",
                &["result"],
                PIPELINE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("pipeline_duration_seconds", e))?,

            store_errors_total: register_counter_vec!(
                "insight_store_errors_total",
                "Record store failures absorbed in degraded mode",
                &["operation"]
            )
            .map_err(|e| registration_error("store_errors_total", e))?,

            pipelines_in_flight: register_int_gauge!(
                "insight_pipelines_in_flight",
                "Acquisition pipelines currently running"
            )
            .map_err(|e| registration_error("pipelines_in_flight", e))?,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_cache_lookup(&self, outcome: CacheOutcome) {
        self.cache_lookups_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Record an upstream call. `result` is "success" or an error category tag.
    pub fn record_upstream_call(&self, kind: &str, result: &str) {
        self.upstream_calls_total
            .with_label_values(&[kind, result])
            .inc();
    }

    pub fn record_pipeline(&self, result: &str, duration_secs: f64) {
        self.pipeline_duration_seconds
            .with_label_values(&[result])
            .observe(duration_secs);
    }

    pub fn record_store_error(&self, operation: &str) {
        self.store_errors_total
            .with_label_values(&[operation])
            .inc();
    }
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

/// Handler for GET /metrics.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler() -> impl IntoResponse {
    // Register before gathering so a fresh process still reports every family.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_once() {
        let first = metrics().map(|m| m as *const InsightMetrics);
        let second = metrics().map(|m| m as *const InsightMetrics);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_cache_lookup_counter_increments() {
        let m = metrics().unwrap();
        let before = m.cache_lookups_total.with_label_values(&["stale"]).get();
        m.record_cache_lookup(CacheOutcome::Stale);
        let after = m.cache_lookups_total.with_label_values(&["stale"]).get();
        assert!(after >= before + 1.0);
    }

    #[test]
    fn test_cache_outcome_labels() {
        let labels: Vec<_> = [
            CacheOutcome::Hit,
            CacheOutcome::Miss,
            CacheOutcome::Stale,
            CacheOutcome::Bypass,
        ]
        .iter()
        .map(CacheOutcome::as_str)
        .collect();
        assert_eq!(labels, vec!["hit", "miss", "stale", "bypass"]);
    }
}
