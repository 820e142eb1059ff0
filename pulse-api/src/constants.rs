//! Constants for the PULSE orchestrator
//!
//! Defaults for every tunable live here so configuration, tests and docs
//! agree on them.

use std::time::Duration;

// ============================================================================
// DOWNSTREAM SERVICES
// ============================================================================

/// Default base URL of the user service
pub const DEFAULT_USER_SERVICE_URL: &str = "http://localhost:8081";

/// Default base URL of the task service
pub const DEFAULT_TASK_SERVICE_URL: &str = "http://localhost:8082";

/// Default base URL of the mood service
pub const DEFAULT_MOOD_SERVICE_URL: &str = "http://localhost:8083";

/// Default base URL of the journal service
pub const DEFAULT_JOURNAL_SERVICE_URL: &str = "http://localhost:8084";

/// Default base URL of the task-journal link service
pub const DEFAULT_LINK_SERVICE_URL: &str = "http://localhost:8085";

/// Timeout applied to a single downstream attempt (2 seconds)
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Deadline for composing one inbound request, retries included (5 seconds)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// RETRY
// ============================================================================

/// Attempts per call, counting the first one
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Base of the exponential backoff in milliseconds
pub const DEFAULT_RETRY_BASE_BACKOFF_MS: u64 = 100;

// ============================================================================
// CACHE
// ============================================================================

/// Lifetime of a cached downstream read in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;

/// Upper bound on cached entries
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// Minimum required length for JWT secret keys
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Header carrying a client-supplied idempotency key
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

// ============================================================================
// SERVER
// ============================================================================

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
