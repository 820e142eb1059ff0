//! Dashboard REST API Routes
//!
//! `GET /api/v1/dashboard` composes the caller's dashboard. The response is
//! 200 whenever the caller's identity resolves, however many sections are
//! degraded; per-section status tells the client what is usable.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use pulse_core::Cancellation;

use crate::credential::ForwardedCredential;
use crate::error::ApiResult;
use crate::state::AppState;

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/dashboard - Compose the caller's dashboard
pub async fn get_dashboard(
    State(state): State<AppState>,
    ForwardedCredential(credential): ForwardedCredential,
) -> ApiResult<impl IntoResponse> {
    let view = state
        .orchestrator
        .compose_dashboard(credential, Cancellation::never())
        .await?;
    Ok(Json(view))
}

/// DELETE /api/v1/dashboard/cache - Drop the caller's cached sections
pub async fn bust_cache(
    State(state): State<AppState>,
    ForwardedCredential(credential): ForwardedCredential,
) -> ApiResult<StatusCode> {
    state
        .orchestrator
        .bust_cache(credential, Cancellation::never())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_dashboard))
        .route("/cache", delete(bust_cache))
}
