//! PULSE API Server Entry Point
//!
//! Reads configuration from the environment, wires the orchestrator and
//! starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use pulse_api::telemetry::{init_tracing, TelemetryConfig};
use pulse_api::{create_router, ApiError, ApiResult, AppState, Orchestrator, OrchestratorConfig};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = OrchestratorConfig::from_env()?;
    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    tracing::info!(
        identity_mode = ?config.identity_mode,
        request_timeout_ms = config.request_timeout.as_millis() as u64,
        max_attempts = config.retry.max_attempts,
        cache_ttl_secs = config.cache.ttl.as_secs(),
        "Orchestrator configured"
    );

    let app = create_router(AppState::new(orchestrator));

    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        ApiError::invalid_input(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;
    tracing::info!(%addr, "Starting PULSE orchestrator");

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
