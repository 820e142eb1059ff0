//! Task REST API Routes
//!
//! Task creation is forwarded to the task service. The inbound
//! `Idempotency-Key` header is passed through and is what makes the write
//! eligible for retry.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use pulse_core::{Cancellation, NewTask};

use crate::constants::IDEMPOTENCY_KEY_HEADER;
use crate::credential::ForwardedCredential;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /api/v1/tasks - Create a task through the task service
pub async fn create_task(
    State(state): State<AppState>,
    ForwardedCredential(credential): ForwardedCredential,
    headers: HeaderMap,
    Json(req): Json<NewTask>,
) -> ApiResult<impl IntoResponse> {
    if req.title.trim().is_empty() {
        return Err(ApiError::invalid_input("title is required"));
    }

    let idempotency_key = idempotency_key(&headers)?;
    let task = state
        .orchestrator
        .create_task(credential, Cancellation::never(), req, idempotency_key)
        .await?
        .into_result()
        .map_err(|(kind, message)| ApiError::from_failure(kind, message))?;

    Ok((StatusCode::CREATED, Json(task)))
}

fn idempotency_key(headers: &HeaderMap) -> ApiResult<Option<String>> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map_err(|_| ApiError::invalid_input("Idempotency-Key must be visible ASCII"))?
        .trim();
    if key.is_empty() {
        return Ok(None);
    }
    Ok(Some(key.to_string()))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/", post(create_task))
}
