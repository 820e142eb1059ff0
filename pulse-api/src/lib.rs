//! PULSE API - Dashboard orchestrator
//!
//! Fans one inbound dashboard request out to the user, task, mood, journal
//! and task-journal-link services, and composes their answers into a single
//! view whose sections are individually fulfilled or degraded.
//!
//! Request flow: the caller's credential is forwarded onto every downstream
//! call; each call goes through the section cache, then the retry policy,
//! then the HTTP client.

pub mod clients;
pub mod config;
pub mod constants;
pub mod credential;
pub mod error;
pub mod identity;
pub mod resilience;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use clients::{
    CallContext, Downstreams, JournalService, LinkService, MoodService, TaskService, UserService,
};
pub use config::{IdentityMode, OrchestratorConfig, ServiceEndpoints};
pub use credential::ForwardedCredential;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use identity::{
    Claims, FixedClock, IdentityResolver, JwtClock, JwtIdentityResolver, JwtSecret,
    RemoteIdentityResolver, SystemClock,
};
pub use resilience::Resilience;
pub use routes::create_router;
pub use services::{Orchestrator, OrchestratorBuilder, SectionCaches};
pub use state::AppState;
