//! Error Types for the PULSE HTTP surface
//!
//! This module defines error handling for the API layer:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! Degraded dashboard sections are not errors and never pass through here;
//! only identity failures, bad input and failed writes do.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pulse_core::{AuthError, CompositionError, ConfigError, FailureKind};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401)
    // ========================================================================
    /// The requester's identity could not be established
    IdentityUnresolved,

    /// Authentication token has expired
    TokenExpired,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    // ========================================================================
    // Downstream Errors (502, 504)
    // ========================================================================
    /// A downstream service failed or returned an unreadable body
    DownstreamFailed,

    /// Operation timed out
    Timeout,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Startup configuration is invalid
    ConfigurationError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::IdentityUnresolved | ErrorCode::TokenExpired => StatusCode::UNAUTHORIZED,

            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,

            ErrorCode::DownstreamFailed => StatusCode::BAD_GATEWAY,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::InternalError | ErrorCode::ConfigurationError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn identity_unresolved(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IdentityUnresolved, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Map a failed downstream write onto an HTTP error, keeping the failure
    /// kind in `details`.
    pub fn from_failure(kind: FailureKind, message: impl Into<String>) -> Self {
        let code = match kind {
            FailureKind::InvalidInput => ErrorCode::InvalidInput,
            FailureKind::Transport | FailureKind::Decode => ErrorCode::DownstreamFailed,
            FailureKind::TimedOut => ErrorCode::Timeout,
            FailureKind::Identity => ErrorCode::IdentityUnresolved,
        };
        Self::new(code, message).with_details(serde_json::json!({ "reason": kind }))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Convert ApiError into an HTTP response.
///
/// ```ignore
/// async fn handler() -> Result<Json<DashboardView>, ApiError> {
///     Err(ApiError::identity_unresolved("No credential supplied"))
/// }
/// ```
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::Expired => ApiError::new(ErrorCode::TokenExpired, err.to_string()),
            AuthError::ProviderUnavailable { kind, .. } => {
                ApiError::new(ErrorCode::IdentityUnresolved, err.to_string())
                    .with_details(serde_json::json!({ "reason": kind }))
            }
            AuthError::MissingCredential
            | AuthError::InvalidCredential { .. }
            | AuthError::UnknownRole { .. } => ApiError::identity_unresolved(err.to_string()),
        }
    }
}

impl From<CompositionError> for ApiError {
    fn from(err: CompositionError) -> Self {
        match err {
            CompositionError::Identity(auth) => auth.into(),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigurationError, err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("JSON error: {}", err))
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
