//! Error types for PULSE orchestration

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure taxonomy for downstream calls and composition.
///
/// Each kind carries its own retry semantics: `Transport` and `TimedOut` are
/// transient, `InvalidInput` and `Decode` are not. `Identity` never comes out
/// of a section call; it is reserved for the identity-resolution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Caller error, rejected before any network I/O.
    InvalidInput,
    /// Connection failure or non-2xx status.
    Transport,
    /// Successful transport but the body did not deserialize.
    Decode,
    /// Deadline exceeded or the request was cancelled.
    TimedOut,
    /// The requester's identity could not be established.
    Identity,
}

impl FailureKind {
    /// Whether a call that failed with this kind may be attempted again.
    pub fn is_transient(&self) -> bool {
        match self {
            FailureKind::Transport | FailureKind::TimedOut => true,
            FailureKind::InvalidInput | FailureKind::Decode | FailureKind::Identity => false,
        }
    }

    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::Transport => "transport",
            FailureKind::Decode => "decode",
            FailureKind::TimedOut => "timed_out",
            FailureKind::Identity => "identity",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity resolution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("No credential supplied")]
    MissingCredential,

    #[error("Credential rejected: {reason}")]
    InvalidCredential { reason: String },

    #[error("Credential expired")]
    Expired,

    #[error("Unknown role: {role}")]
    UnknownRole { role: String },

    #[error("Identity provider unavailable: {kind}: {message}")]
    ProviderUnavailable { kind: FailureKind, message: String },
}

/// Configuration errors raised while building the orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// The only fatal outcome of composing a dashboard.
///
/// Every other downstream problem degrades a single section instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompositionError {
    #[error("Identity resolution failed: {0}")]
    Identity(#[from] AuthError),
}

impl CompositionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CompositionError::Identity(_) => FailureKind::Identity,
        }
    }
}
