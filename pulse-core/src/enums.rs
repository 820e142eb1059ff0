//! Enum types for PULSE requests and payloads

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ROLE
// ============================================================================

/// Role of the requester. Determines which dashboard sections are composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Developer,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Developer => "developer",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    /// Parse a role name, case-insensitively.
    pub fn parse(s: &str) -> Result<Self, RoleParseError> {
        match s.trim().to_lowercase().as_str() {
            "developer" => Ok(Role::Developer),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            _ => Err(RoleParseError(s.to_string())),
        }
    }

    /// Sections composed for this role, in presentation order.
    ///
    /// The orchestrator's per-role call sets (`Orchestrator::sections_for` in
    /// pulse-api) must produce exactly these sections. Change both together.
    pub fn dashboard_sections(&self) -> &'static [ResourceKind] {
        match self {
            Role::Developer => &[
                ResourceKind::Profile,
                ResourceKind::Tasks,
                ResourceKind::Moods,
                ResourceKind::Journals,
                ResourceKind::JournalLinks,
            ],
            Role::Manager => &[
                ResourceKind::Profile,
                ResourceKind::Tasks,
                ResourceKind::Team,
                ResourceKind::TeamTasks,
            ],
            Role::Admin => &[ResourceKind::Profile, ResourceKind::Team, ResourceKind::Tasks],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error when parsing an invalid role string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleParseError(pub String);

impl fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid role: {}", self.0)
    }
}

impl std::error::Error for RoleParseError {}

// ============================================================================
// DOWNSTREAM SERVICES AND RESOURCES
// ============================================================================

/// Independently deployed entity service the orchestrator talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    User,
    Task,
    Mood,
    Journal,
    TaskJournalLink,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::User => "user",
            ServiceKind::Task => "task",
            ServiceKind::Mood => "mood",
            ServiceKind::Journal => "journal",
            ServiceKind::TaskJournalLink => "task_journal_link",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical resource fetched for a dashboard. Doubles as the section name
/// and as the resource half of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Profile,
    Tasks,
    Moods,
    Journals,
    JournalLinks,
    Team,
    TeamTasks,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Profile => "profile",
            ResourceKind::Tasks => "tasks",
            ResourceKind::Moods => "moods",
            ResourceKind::Journals => "journals",
            ResourceKind::JournalLinks => "journal_links",
            ResourceKind::Team => "team",
            ResourceKind::TeamTasks => "team_tasks",
        }
    }

    /// The service that owns this resource.
    pub fn service(&self) -> ServiceKind {
        match self {
            ResourceKind::Profile | ResourceKind::Team => ServiceKind::User,
            ResourceKind::Tasks | ResourceKind::TeamTasks => ServiceKind::Task,
            ResourceKind::Moods => ServiceKind::Mood,
            ResourceKind::Journals => ServiceKind::Journal,
            ResourceKind::JournalLinks => ServiceKind::TaskJournalLink,
        }
    }

    /// The resource this one needs ids from, if any.
    pub fn depends_on(&self) -> Option<ResourceKind> {
        match self {
            ResourceKind::JournalLinks => Some(ResourceKind::Journals),
            ResourceKind::TeamTasks => Some(ResourceKind::Team),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PAYLOAD ENUMS
// ============================================================================

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Blocked,
    Done,
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Self-reported mood on a five point scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodLevel {
    Awful,
    Bad,
    Okay,
    Good,
    Great,
}
