//! Payloads returned by the downstream entity services.
//!
//! These are transient view objects; the orchestrator owns no persistent
//! state. Field names follow the camelCase the entity services emit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MoodLevel, Role, TaskPriority, TaskStatus};

/// A user profile from the user service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<Uuid>,
}

/// A task from the task service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Body of a task creation forwarded to the task service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

/// A mood check-in from the mood service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub level: MoodLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A journal entry from the journal service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<MoodLevel>,
    pub created_at: DateTime<Utc>,
}

/// Association between a task and a journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskJournalLink {
    pub id: Uuid,
    pub task_id: Uuid,
    pub journal_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_item_defaults_missing_enums() {
        let json = serde_json::json!({
            "id": Uuid::nil(),
            "title": "Write docs",
            "createdAt": "2024-01-01T00:00:00Z"
        });
        let task: TaskItem = serde_json::from_value(json).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(task.assignee_id.is_none());
    }

    #[test]
    fn test_profile_uses_camel_case() {
        let profile = UserProfile {
            id: Uuid::nil(),
            username: "ada".to_string(),
            display_name: Some("Ada".to_string()),
            email: None,
            role: Role::Manager,
            manager_id: None,
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["displayName"], "Ada");
        assert_eq!(json["role"], "manager");
        assert!(json.get("email").is_none());
    }
}
