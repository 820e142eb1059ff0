//! The tagged outcome of a single downstream call.

use crate::FailureKind;

/// Outcome of one downstream call: exactly one of success, failure, or
/// timeout. Clients and the resilience wrapper never panic or return an
/// error past this type.
#[derive(Debug, Clone, PartialEq)]
pub enum DownstreamResult<T> {
    Success(T),
    Failure { kind: FailureKind, message: String },
    TimedOut,
}

impl<T> DownstreamResult<T> {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        if kind == FailureKind::TimedOut {
            return DownstreamResult::TimedOut;
        }
        DownstreamResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::InvalidInput, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::Transport, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::Decode, message)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DownstreamResult::Success(_))
    }

    /// The failure kind, with `TimedOut` reported as its own kind.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            DownstreamResult::Success(_) => None,
            DownstreamResult::Failure { kind, .. } => Some(*kind),
            DownstreamResult::TimedOut => Some(FailureKind::TimedOut),
        }
    }

    /// Whether the resilience wrapper may try this call again.
    pub fn is_transient(&self) -> bool {
        self.failure_kind().is_some_and(|kind| kind.is_transient())
    }

    /// Label used in logs and metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self.failure_kind() {
            None => "success",
            Some(kind) => kind.as_str(),
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            DownstreamResult::Success(_) => None,
            DownstreamResult::Failure { message, .. } => Some(message),
            DownstreamResult::TimedOut => Some("deadline exceeded"),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> DownstreamResult<U> {
        match self {
            DownstreamResult::Success(value) => DownstreamResult::Success(f(value)),
            DownstreamResult::Failure { kind, message } => DownstreamResult::Failure { kind, message },
            DownstreamResult::TimedOut => DownstreamResult::TimedOut,
        }
    }

    pub fn as_ref(&self) -> DownstreamResult<&T> {
        match self {
            DownstreamResult::Success(value) => DownstreamResult::Success(value),
            DownstreamResult::Failure { kind, message } => DownstreamResult::Failure {
                kind: *kind,
                message: message.clone(),
            },
            DownstreamResult::TimedOut => DownstreamResult::TimedOut,
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            DownstreamResult::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Convert into a std `Result`, pairing failures with their message.
    pub fn into_result(self) -> Result<T, (FailureKind, String)> {
        match self {
            DownstreamResult::Success(value) => Ok(value),
            DownstreamResult::Failure { kind, message } => Err((kind, message)),
            DownstreamResult::TimedOut => {
                Err((FailureKind::TimedOut, "deadline exceeded".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_with_timed_out_kind_normalizes() {
        let result: DownstreamResult<()> = DownstreamResult::failure(FailureKind::TimedOut, "slow");
        assert_eq!(result, DownstreamResult::TimedOut);
    }

    #[test]
    fn test_failure_kinds_and_labels() {
        let ok: DownstreamResult<u8> = DownstreamResult::Success(1);
        assert_eq!(ok.failure_kind(), None);
        assert_eq!(ok.outcome_label(), "success");

        let transport: DownstreamResult<u8> = DownstreamResult::transport("503");
        assert!(transport.is_transient());
        assert_eq!(transport.outcome_label(), "transport");

        let decode: DownstreamResult<u8> = DownstreamResult::decode("bad json");
        assert!(!decode.is_transient());

        let timed_out: DownstreamResult<u8> = DownstreamResult::TimedOut;
        assert!(timed_out.is_transient());
        assert_eq!(timed_out.failure_kind(), Some(FailureKind::TimedOut));
    }

    #[test]
    fn test_map_preserves_failure() {
        let failed: DownstreamResult<u8> = DownstreamResult::invalid_input("bad id");
        let mapped = failed.map(|v| v as u32 * 2);
        assert_eq!(mapped.failure_kind(), Some(FailureKind::InvalidInput));
        assert_eq!(mapped.failure_message(), Some("bad id"));

        let ok: DownstreamResult<u8> = DownstreamResult::Success(4);
        assert_eq!(ok.map(|v| v as u32 * 2), DownstreamResult::Success(8));
    }
}
