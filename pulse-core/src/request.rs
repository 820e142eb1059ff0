//! Outbound request description and the forwarded bearer credential.

use crate::{FailureKind, ServiceKind};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// CREDENTIAL
// ============================================================================

/// The caller's bearer credential, normalized to `Bearer <token>`.
///
/// The secret is never printed; `Debug` is redacted.
#[derive(Clone)]
pub struct Credential {
    header_value: Arc<SecretString>,
}

impl Credential {
    /// Normalize an inbound `Authorization` value.
    ///
    /// `abc123` and `bearer abc123` both become `Bearer abc123`. A value that
    /// already names a different scheme (`Basic ...`) is kept verbatim so the
    /// downstream service can reject it. Blank values yield `None`.
    pub fn from_header(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let value = match raw.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => {
                let token = rest.trim();
                if token.is_empty() {
                    return None;
                }
                format!("Bearer {}", token)
            }
            Some(_) => raw.to_string(),
            None if raw.eq_ignore_ascii_case("bearer") => return None,
            None => format!("Bearer {}", raw),
        };

        Some(Self {
            header_value: Arc::new(SecretString::from(value)),
        })
    }

    /// The full header value to attach to outbound requests.
    pub fn header_value(&self) -> &str {
        self.header_value.expose_secret()
    }

    /// The token without its scheme, when the scheme is `Bearer`.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header_value().strip_prefix("Bearer ")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.header_value() == other.header_value()
    }
}

// ============================================================================
// DOWNSTREAM REQUEST
// ============================================================================

/// HTTP method of an outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

/// One outbound call to a downstream service.
///
/// Built once per call and never mutated afterwards; the credential forwarder
/// attaches the credential while building.
#[derive(Debug, Clone)]
pub struct DownstreamRequest {
    service: ServiceKind,
    operation: &'static str,
    method: RequestMethod,
    path: String,
    query: Vec<(String, String)>,
    identities: Vec<String>,
    body: Option<serde_json::Value>,
    idempotency_key: Option<String>,
    credential: Option<Credential>,
}

impl DownstreamRequest {
    pub fn get(service: ServiceKind, operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(service, operation, RequestMethod::Get, path)
    }

    pub fn post(
        service: ServiceKind,
        operation: &'static str,
        path: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        let mut request = Self::new(service, operation, RequestMethod::Post, path);
        request.body = Some(body);
        request
    }

    fn new(
        service: ServiceKind,
        operation: &'static str,
        method: RequestMethod,
        path: impl Into<String>,
    ) -> Self {
        Self {
            service,
            operation,
            method,
            path: path.into(),
            query: Vec::new(),
            identities: Vec::new(),
            body: None,
            idempotency_key: None,
            credential: None,
        }
    }

    /// Record an identity parameter; it is validated before any I/O.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identities.push(identity.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn identities(&self) -> &[String] {
        &self.identities
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Reads are always safe to repeat; writes only with an idempotency key.
    pub fn is_retry_safe(&self) -> bool {
        match self.method {
            RequestMethod::Get => true,
            RequestMethod::Post => self.idempotency_key.is_some(),
        }
    }

    /// Check identity parameters are well-formed UUIDs.
    pub fn validate(&self) -> Result<(), (FailureKind, String)> {
        for identity in &self.identities {
            if Uuid::parse_str(identity).is_err() {
                return Err((
                    FailureKind::InvalidInput,
                    format!("Malformed identity parameter: {:?}", identity),
                ));
            }
        }
        if self.path.is_empty() || !self.path.starts_with('/') {
            return Err((
                FailureKind::InvalidInput,
                format!("Resource path must be absolute: {:?}", self.path),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_prefixes_bare_token() {
        let credential = Credential::from_header("abc123").unwrap();
        assert_eq!(credential.header_value(), "Bearer abc123");
        assert_eq!(credential.bearer_token(), Some("abc123"));
    }

    #[test]
    fn test_credential_does_not_double_prefix() {
        let credential = Credential::from_header("Bearer abc123").unwrap();
        assert_eq!(credential.header_value(), "Bearer abc123");

        let lower = Credential::from_header("bearer   abc123 ").unwrap();
        assert_eq!(lower.header_value(), "Bearer abc123");
    }

    #[test]
    fn test_credential_blank_values() {
        assert!(Credential::from_header("").is_none());
        assert!(Credential::from_header("   ").is_none());
        assert!(Credential::from_header("Bearer").is_none());
        assert!(Credential::from_header("Bearer   ").is_none());
    }

    #[test]
    fn test_credential_keeps_other_schemes() {
        let credential = Credential::from_header("Basic dXNlcjpwYXNz").unwrap();
        assert_eq!(credential.header_value(), "Basic dXNlcjpwYXNz");
        assert_eq!(credential.bearer_token(), None);
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::from_header("supersecret").unwrap();
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("supersecret"));
    }

    #[test]
    fn test_request_validation() {
        let id = Uuid::now_v7().to_string();
        let ok = DownstreamRequest::get(ServiceKind::Task, "tasks_for_user", format!("/api/tasks/user/{}", id))
            .with_identity(id);
        assert!(ok.validate().is_ok());

        let bad = DownstreamRequest::get(ServiceKind::Task, "tasks_for_user", "/api/tasks/user/nope")
            .with_identity("nope");
        let (kind, message) = bad.validate().unwrap_err();
        assert_eq!(kind, FailureKind::InvalidInput);
        assert!(message.contains("nope"));

        let relative = DownstreamRequest::get(ServiceKind::Task, "tasks", "api/tasks");
        assert!(relative.validate().is_err());
    }

    #[test]
    fn test_retry_safety() {
        let read = DownstreamRequest::get(ServiceKind::Task, "tasks", "/api/tasks");
        assert!(read.is_retry_safe());

        let write = DownstreamRequest::post(ServiceKind::Task, "create_task", "/api/tasks", serde_json::json!({}));
        assert!(!write.is_retry_safe());
        assert!(write.with_idempotency_key("k-1").is_retry_safe());
    }
}
