//! Axum middleware for request tracing and metrics
//!
//! Metrics are labelled by the matched route template, never the raw path,
//! so identity URLs never become label values.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::metrics;

const UNMATCHED_ROUTE: &str = "unmatched";

/// Observability middleware.
///
/// Wraps every request in a span and records count and latency.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.route = %route,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();
    if let Some(m) = metrics() {
        m.record_http_request(method.as_str(), &route, status.as_u16(), duration.as_secs_f64());
    }

    tracing::info!(
        method = %method,
        path = %path,
        route = %route,
        status = status.as_u16(),
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}
