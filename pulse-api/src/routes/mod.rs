//! REST API Routes Module
//!
//! - Dashboard composition and cache bust under /api/v1/dashboard
//! - Task creation pass-through under /api/v1/tasks
//! - Health check endpoints under /health
//! - Prometheus metrics at /metrics

pub mod dashboard;
pub mod health;
pub mod task;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::constants::IDEMPOTENCY_KEY_HEADER;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use dashboard::create_router as dashboard_router;
pub use health::create_router as health_router;
pub use task::create_router as task_router;

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(IDEMPOTENCY_KEY_HEADER),
        ])
        .allow_origin(Any)
        .max_age(Duration::from_secs(3600))
}

/// Create the complete orchestrator router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .nest("/dashboard", dashboard_router())
        .nest("/tasks", task_router());

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_router())
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(from_fn(observability_middleware))
        .layer(build_cors_layer())
}
