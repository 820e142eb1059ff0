//! Shared application state for Axum routers.

use std::sync::Arc;

use crate::services::Orchestrator;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            start_time: std::time::Instant::now(),
        }
    }
}
