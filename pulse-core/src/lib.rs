//! PULSE Core - shared types for the dashboard orchestrator
//!
//! Everything that crosses a crate boundary lives here: the failure taxonomy,
//! the outbound request and its tagged result, the retry policy, the
//! cancellation signal, downstream payloads and the composed view.

pub mod cancel;
pub mod entities;
pub mod enums;
pub mod error;
pub mod request;
pub mod result;
pub mod retry;
pub mod view;

pub use cancel::{CancelHandle, Cancellation};
pub use entities::{JournalEntry, MoodEntry, NewTask, TaskItem, TaskJournalLink, UserProfile};
pub use enums::{
    MoodLevel, ResourceKind, Role, RoleParseError, ServiceKind, TaskPriority, TaskStatus,
};
pub use error::{AuthError, CompositionError, ConfigError, FailureKind};
pub use request::{Credential, DownstreamRequest, RequestMethod};
pub use result::DownstreamResult;
pub use retry::RetryPolicy;
pub use view::{
    DashboardSections, DashboardView, Identity, Section, SectionDiagnostic, SectionStatus,
};
