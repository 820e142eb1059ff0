//! Identity resolution.
//!
//! Establishing who the requester is is the one step a dashboard cannot be
//! composed without. Two resolvers are provided:
//! 1. [`JwtIdentityResolver`] verifies an HS256 bearer token locally
//! 2. [`RemoteIdentityResolver`] asks the user service via `GET /api/users/me`

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pulse_core::{
    AuthError, Cancellation, ConfigError, Credential, DownstreamResult, FailureKind, Identity, Role,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clients::{CallContext, UserService};

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Clock used for token expiry checks, injectable for deterministic tests.
pub trait JwtClock: Send + Sync {
    /// Current time as Unix epoch seconds.
    fn now_epoch_secs(&self) -> i64;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

// ============================================================================
// JWT SECRET
// ============================================================================

/// HS256 signing secret that never shows up in logs.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// # Errors
    /// Returns error if the secret is empty.
    pub fn new(secret: String) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "PULSE_JWT_SECRET".to_string(),
            });
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value (use sparingly, only for cryptographic operations).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Get the length of the secret without exposing it.
    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

// ============================================================================
// RESOLVER TRAIT
// ============================================================================

/// Establishes the requester's identity from the forwarded credential.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(
        &self,
        credential: Option<&Credential>,
        cancel: &Cancellation,
    ) -> Result<Identity, AuthError>;
}

// ============================================================================
// JWT RESOLVER
// ============================================================================

/// Claims carried by a PULSE bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Role name, matched case-insensitively
    pub role: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: impl Into<String>, role: Role, now: i64, ttl_secs: i64) -> Self {
        Self {
            sub: user_id.into(),
            role: role.as_str().to_string(),
            name: None,
            iat: now,
            exp: now + ttl_secs,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Verifies HS256 tokens locally.
///
/// Signature checks go through `jsonwebtoken`; expiry is checked against the
/// injected [`JwtClock`] with a leeway for clock drift.
#[derive(Clone)]
pub struct JwtIdentityResolver {
    secret: JwtSecret,
    clock: Arc<dyn JwtClock>,
    leeway_secs: i64,
}

impl JwtIdentityResolver {
    pub fn new(secret: JwtSecret) -> Self {
        Self {
            secret,
            clock: Arc::new(SystemClock),
            leeway_secs: 60,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn JwtClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_leeway(mut self, leeway_secs: i64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// Sign `claims` with this resolver's secret.
    pub fn issue(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.secret.expose().as_bytes()),
        )
        .map_err(|e| AuthError::InvalidCredential {
            reason: format!("Failed to sign token: {}", e),
        })
    }

    /// Verify a raw token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the injected clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims = std::collections::HashSet::from(["exp".to_string()]);

        let decoding_key = DecodingKey::from_secret(self.secret.expose().as_bytes());
        let claims = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| {
                let reason = match e.kind() {
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        "Token signature is invalid".to_string()
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidToken => "Token is invalid".to_string(),
                    _ => format!("Token validation failed: {}", e),
                };
                AuthError::InvalidCredential { reason }
            })?
            .claims;

        if claims.exp < self.clock.now_epoch_secs() - self.leeway_secs {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for JwtIdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentityResolver")
            .field("secret", &self.secret)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(
        &self,
        credential: Option<&Credential>,
        _cancel: &Cancellation,
    ) -> Result<Identity, AuthError> {
        let credential = credential.ok_or(AuthError::MissingCredential)?;
        let token = credential
            .bearer_token()
            .ok_or_else(|| AuthError::InvalidCredential {
                reason: "Expected a Bearer credential".to_string(),
            })?;

        let claims = self.verify(token)?;
        let role = Role::parse(&claims.role).map_err(|_| AuthError::UnknownRole {
            role: claims.role.clone(),
        })?;
        // every section call is keyed by this id
        if Uuid::parse_str(&claims.sub).is_err() {
            return Err(AuthError::InvalidCredential {
                reason: "Token subject is not a user id".to_string(),
            });
        }

        let identity = Identity::new(claims.sub, role);
        Ok(match claims.name {
            Some(name) => identity.with_display_name(name),
            None => identity,
        })
    }
}

// ============================================================================
// REMOTE RESOLVER
// ============================================================================

/// Resolves identity through the user service.
#[derive(Clone)]
pub struct RemoteIdentityResolver {
    users: Arc<dyn UserService>,
}

impl RemoteIdentityResolver {
    pub fn new(users: Arc<dyn UserService>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl IdentityResolver for RemoteIdentityResolver {
    async fn resolve(
        &self,
        credential: Option<&Credential>,
        cancel: &Cancellation,
    ) -> Result<Identity, AuthError> {
        let credential = credential.ok_or(AuthError::MissingCredential)?;
        let ctx = CallContext::new(Some(credential.clone()), cancel.clone());

        match self.users.current_user(&ctx).await {
            DownstreamResult::Success(profile) => {
                let identity = Identity::new(profile.id.to_string(), profile.role);
                Ok(match profile.display_name {
                    Some(name) => identity.with_display_name(name),
                    None => identity.with_display_name(profile.username),
                })
            }
            DownstreamResult::Failure { kind, message } => {
                Err(AuthError::ProviderUnavailable { kind, message })
            }
            DownstreamResult::TimedOut => Err(AuthError::ProviderUnavailable {
                kind: FailureKind::TimedOut,
                message: "identity lookup timed out".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-characters";
    /// 2024-01-01 00:00:00 UTC
    const NOW: i64 = 1_704_067_200;
    const USER_ID: &str = "0190a5b2-0000-7000-8000-000000000001";

    fn resolver() -> JwtIdentityResolver {
        JwtIdentityResolver::new(JwtSecret::new(SECRET.to_string()).unwrap())
            .with_clock(Arc::new(FixedClock(NOW)))
    }

    fn bearer(token: &str) -> Credential {
        Credential::from_header(token).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_valid_token() {
        let resolver = resolver();
        let token = resolver
            .issue(&Claims::new(USER_ID, Role::Manager, NOW, 3600).with_name("Ada"))
            .unwrap();

        let identity = resolver
            .resolve(Some(&bearer(&token)), &Cancellation::never())
            .await
            .unwrap();

        assert_eq!(identity.user_id, USER_ID);
        assert_eq!(identity.role, Role::Manager);
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let err = resolver()
            .resolve(None, &Cancellation::never())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::MissingCredential);
    }

    #[tokio::test]
    async fn test_expired_token() {
        let resolver = resolver();
        let token = resolver
            .issue(&Claims::new(USER_ID, Role::Developer, NOW - 7200, 3600))
            .unwrap();
        let err = resolver
            .resolve(Some(&bearer(&token)), &Cancellation::never())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Expired);
    }

    #[tokio::test]
    async fn test_expiry_within_leeway_is_accepted() {
        let resolver = resolver();
        let token = resolver
            .issue(&Claims::new(USER_ID, Role::Developer, NOW - 3630, 3600))
            .unwrap();
        assert!(resolver
            .resolve(Some(&bearer(&token)), &Cancellation::never())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_wrong_signature() {
        let other = JwtIdentityResolver::new(
            JwtSecret::new("another-secret-key-at-least-32-chars".to_string()).unwrap(),
        );
        let token = other
            .issue(&Claims::new(USER_ID, Role::Developer, NOW, 3600))
            .unwrap();
        let err = resolver()
            .resolve(Some(&bearer(&token)), &Cancellation::never())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential { .. }));
    }

    #[tokio::test]
    async fn test_unknown_role() {
        let resolver = resolver();
        let mut claims = Claims::new(USER_ID, Role::Developer, NOW, 3600);
        claims.role = "intern".to_string();
        let token = resolver.issue(&claims).unwrap();

        let err = resolver
            .resolve(Some(&bearer(&token)), &Cancellation::never())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::UnknownRole { role: "intern".to_string() });
    }

    #[tokio::test]
    async fn test_subject_must_be_a_user_id() {
        let resolver = resolver();
        let token = resolver
            .issue(&Claims::new("u", Role::Developer, NOW, 3600))
            .unwrap();

        let err = resolver
            .resolve(Some(&bearer(&token)), &Cancellation::never())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::InvalidCredential { ref reason } if reason.contains("subject")
        ));
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_rejected() {
        let credential = Credential::from_header("Basic dXNlcjpwYXNz").unwrap();
        let err = resolver()
            .resolve(Some(&credential), &Cancellation::never())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential { .. }));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = JwtSecret::new(SECRET.to_string()).unwrap();
        let debug = format!("{:?}", secret);
        assert!(!debug.contains(SECRET));
        assert!(JwtSecret::new("   ".to_string()).is_err());
    }
}
