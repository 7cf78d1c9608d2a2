//! InsightProfile API Server Entry Point
//!
//! Bootstraps configuration, connects the record store when one is
//! reachable, and starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use insight_api::telemetry::{init_tracer, TelemetryConfig};
use insight_api::{build_service_from_env, create_router, ApiConfig, ApiError, ApiResult, AppState};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let service = Arc::new(build_service_from_env().await?);
    tracing::info!(service = ?service, "Analysis service ready");

    let api_config = ApiConfig::from_env();
    let app = create_router(AppState::new(service), &api_config);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting InsightProfile API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("INSIGHT_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("INSIGHT_API_PORT").ok())
        .unwrap_or_else(|| "8000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
