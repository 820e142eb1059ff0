//! Orchestrator Configuration Module
//!
//! Configuration is loaded from `PULSE_*` environment variables with defaults
//! from [`crate::constants`], validated once at startup and read-only after.

use std::str::FromStr;
use std::time::Duration;

use pulse_cache::CacheConfig;
use pulse_core::{ConfigError, RetryPolicy};

use crate::constants::*;
use crate::identity::JwtSecret;

// ============================================================================
// SERVICE ENDPOINTS
// ============================================================================

/// Base URLs of the downstream entity services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub user: String,
    pub task: String,
    pub mood: String,
    pub journal: String,
    pub link: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            user: DEFAULT_USER_SERVICE_URL.to_string(),
            task: DEFAULT_TASK_SERVICE_URL.to_string(),
            mood: DEFAULT_MOOD_SERVICE_URL.to_string(),
            journal: DEFAULT_JOURNAL_SERVICE_URL.to_string(),
            link: DEFAULT_LINK_SERVICE_URL.to_string(),
        }
    }
}

impl ServiceEndpoints {
    /// Point every service at the same base URL.
    pub fn uniform(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            user: base_url.clone(),
            task: base_url.clone(),
            mood: base_url.clone(),
            journal: base_url.clone(),
            link: base_url,
        }
    }

    fn named(&self) -> [(&'static str, &str); 5] {
        [
            ("PULSE_USER_SERVICE_URL", &self.user),
            ("PULSE_TASK_SERVICE_URL", &self.task),
            ("PULSE_MOOD_SERVICE_URL", &self.mood),
            ("PULSE_JOURNAL_SERVICE_URL", &self.journal),
            ("PULSE_LINK_SERVICE_URL", &self.link),
        ]
    }
}

// ============================================================================
// IDENTITY MODE
// ============================================================================

/// How the requester's identity is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityMode {
    /// Verify an HS256 bearer token locally.
    #[default]
    Jwt,
    /// Ask the user service who the credential belongs to.
    Remote,
}

impl FromStr for IdentityMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jwt" => Ok(IdentityMode::Jwt),
            "remote" => Ok(IdentityMode::Remote),
            _ => Err(ConfigError::InvalidValue {
                field: "PULSE_IDENTITY_MODE".to_string(),
                value: s.to_string(),
                reason: "expected 'jwt' or 'remote'".to_string(),
            }),
        }
    }
}

// ============================================================================
// ORCHESTRATOR CONFIGURATION
// ============================================================================

/// Startup configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub services: ServiceEndpoints,

    /// Timeout for a single downstream attempt.
    pub call_timeout: Duration,

    /// Deadline for composing one inbound request, retries included.
    pub request_timeout: Duration,

    pub retry: RetryPolicy,
    pub cache: CacheConfig,
    pub identity_mode: IdentityMode,

    /// Required when `identity_mode` is [`IdentityMode::Jwt`].
    pub jwt_secret: Option<JwtSecret>,

    pub bind_addr: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            services: ServiceEndpoints::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::new(
                DEFAULT_RETRY_MAX_ATTEMPTS,
                Duration::from_millis(DEFAULT_RETRY_BASE_BACKOFF_MS),
            ),
            cache: CacheConfig::new()
                .with_ttl(Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
                .with_max_entries(DEFAULT_CACHE_MAX_ENTRIES),
            identity_mode: IdentityMode::default(),
            jwt_secret: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Create OrchestratorConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PULSE_USER_SERVICE_URL`, `PULSE_TASK_SERVICE_URL`, `PULSE_MOOD_SERVICE_URL`,
    ///   `PULSE_JOURNAL_SERVICE_URL`, `PULSE_LINK_SERVICE_URL`: service base URLs
    /// - `PULSE_CALL_TIMEOUT_MS`: per-attempt timeout (default: 2000)
    /// - `PULSE_REQUEST_TIMEOUT_MS`: inbound request deadline (default: 5000)
    /// - `PULSE_RETRY_MAX_ATTEMPTS`: attempts per call, first included (default: 3)
    /// - `PULSE_RETRY_BASE_BACKOFF_MS`: backoff base (default: 100)
    /// - `PULSE_RETRY_JITTER`: "true" or "false" (default: true)
    /// - `PULSE_CACHE_TTL_SECS`: cache entry lifetime (default: 30)
    /// - `PULSE_CACHE_MAX_ENTRIES`: cache capacity, 0 = unbounded (default: 10000)
    /// - `PULSE_IDENTITY_MODE`: "jwt" or "remote" (default: jwt)
    /// - `PULSE_JWT_SECRET`: HS256 secret for jwt mode
    /// - `PULSE_BIND_ADDR`: listen address (default: 0.0.0.0:3000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` uses the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let services = ServiceEndpoints {
            user: var("PULSE_USER_SERVICE_URL").unwrap_or(defaults.services.user),
            task: var("PULSE_TASK_SERVICE_URL").unwrap_or(defaults.services.task),
            mood: var("PULSE_MOOD_SERVICE_URL").unwrap_or(defaults.services.mood),
            journal: var("PULSE_JOURNAL_SERVICE_URL").unwrap_or(defaults.services.journal),
            link: var("PULSE_LINK_SERVICE_URL").unwrap_or(defaults.services.link),
        };

        let call_timeout_ms = parse_or(
            "PULSE_CALL_TIMEOUT_MS",
            var("PULSE_CALL_TIMEOUT_MS"),
            defaults.call_timeout.as_millis() as u64,
        )?;
        let request_timeout_ms = parse_or(
            "PULSE_REQUEST_TIMEOUT_MS",
            var("PULSE_REQUEST_TIMEOUT_MS"),
            defaults.request_timeout.as_millis() as u64,
        )?;

        let retry = RetryPolicy::new(
            parse_or(
                "PULSE_RETRY_MAX_ATTEMPTS",
                var("PULSE_RETRY_MAX_ATTEMPTS"),
                defaults.retry.max_attempts,
            )?,
            Duration::from_millis(parse_or(
                "PULSE_RETRY_BASE_BACKOFF_MS",
                var("PULSE_RETRY_BASE_BACKOFF_MS"),
                DEFAULT_RETRY_BASE_BACKOFF_MS,
            )?),
        )
        .with_jitter(
            var("PULSE_RETRY_JITTER")
                .map(|s| s.to_lowercase() != "false")
                .unwrap_or(true),
        );

        let cache = CacheConfig::new()
            .with_ttl(Duration::from_secs(parse_or(
                "PULSE_CACHE_TTL_SECS",
                var("PULSE_CACHE_TTL_SECS"),
                DEFAULT_CACHE_TTL_SECS,
            )?))
            .with_max_entries(parse_or(
                "PULSE_CACHE_MAX_ENTRIES",
                var("PULSE_CACHE_MAX_ENTRIES"),
                DEFAULT_CACHE_MAX_ENTRIES,
            )?);

        let identity_mode = match var("PULSE_IDENTITY_MODE") {
            Some(raw) => raw.parse()?,
            None => IdentityMode::default(),
        };

        let jwt_secret = var("PULSE_JWT_SECRET").map(JwtSecret::new).transpose()?;

        Ok(Self {
            services,
            call_timeout: Duration::from_millis(call_timeout_ms),
            request_timeout: Duration::from_millis(request_timeout_ms),
            retry,
            cache,
            identity_mode,
            jwt_secret,
            bind_addr: var("PULSE_BIND_ADDR").unwrap_or(defaults.bind_addr),
        })
    }

    /// Reject configurations the orchestrator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.cache.validate()?;

        for (field, url) in self.services.named() {
            validate_url(field, url)?;
        }

        for (field, timeout) in [
            ("PULSE_CALL_TIMEOUT_MS", self.call_timeout),
            ("PULSE_REQUEST_TIMEOUT_MS", self.request_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "0".to_string(),
                    reason: "timeout must be positive".to_string(),
                });
            }
        }

        if self.identity_mode == IdentityMode::Jwt {
            let secret = self
                .jwt_secret
                .as_ref()
                .ok_or_else(|| ConfigError::MissingRequired {
                    field: "PULSE_JWT_SECRET".to_string(),
                })?;
            if secret.len() < MIN_JWT_SECRET_LENGTH {
                return Err(ConfigError::InvalidValue {
                    field: "PULSE_JWT_SECRET".to_string(),
                    value: format!("[{} chars]", secret.len()),
                    reason: format!("must be at least {} characters", MIN_JWT_SECRET_LENGTH),
                });
            }
        }

        Ok(())
    }

    pub fn with_services(mut self, services: ServiceEndpoints) -> Self {
        self.services = services;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_identity_mode(mut self, mode: IdentityMode) -> Self {
        self.identity_mode = mode;
        self
    }

    pub fn with_jwt_secret(mut self, secret: JwtSecret) -> Self {
        self.jwt_secret = Some(secret);
        self
    }
}

fn parse_or<T: FromStr>(field: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.clone(),
            reason: "not a valid number".to_string(),
        }),
    }
}

fn validate_url(field: &str, raw: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = reqwest::Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(invalid("scheme must be http or https")),
    }
}
