//! Service Layer
//!
//! Business logic behind the HTTP handlers. Handlers extract the caller's
//! credential and delegate here; services never touch axum types.

mod dashboard_service;

pub use dashboard_service::*;
