//! Composed dashboard view model.
//!
//! A [`DashboardView`] always carries the requester's summary. Every other
//! part is an optional [`Section`] whose [`SectionStatus`] mirrors the outcome
//! of the downstream call that produced it.

use serde::{Deserialize, Serialize};

use crate::{
    DownstreamResult, FailureKind, JournalEntry, MoodEntry, ResourceKind, Role, TaskItem,
    TaskJournalLink, UserProfile,
};

// ============================================================================
// IDENTITY
// ============================================================================

/// Who the requester is, as established by identity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

// ============================================================================
// SECTIONS
// ============================================================================

/// Whether a section is backed by a successful call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SectionStatus {
    Fulfilled,
    Degraded { reason: FailureKind, message: String },
}

impl SectionStatus {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, SectionStatus::Fulfilled)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SectionStatus::Fulfilled => "fulfilled",
            SectionStatus::Degraded { .. } => "degraded",
        }
    }
}

/// One named part of a composed view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section<T> {
    pub status: SectionStatus,
    pub data: T,
}

impl<T: Default> Section<T> {
    pub fn fulfilled(data: T) -> Self {
        Self {
            status: SectionStatus::Fulfilled,
            data,
        }
    }

    /// An empty section carrying the reason it could not be filled.
    pub fn degraded(reason: FailureKind, message: impl Into<String>) -> Self {
        Self {
            status: SectionStatus::Degraded {
                reason,
                message: message.into(),
            },
            data: T::default(),
        }
    }

    /// The only way the aggregator turns a call outcome into a section, so
    /// status always matches the backing result.
    pub fn from_result(result: DownstreamResult<T>) -> Self {
        match result {
            DownstreamResult::Success(data) => Self::fulfilled(data),
            DownstreamResult::Failure { kind, message } => Self::degraded(kind, message),
            DownstreamResult::TimedOut => Self::degraded(FailureKind::TimedOut, "deadline exceeded"),
        }
    }
}

impl<T> Section<T> {
    pub fn is_fulfilled(&self) -> bool {
        self.status.is_fulfilled()
    }
}

/// All sections a dashboard can carry; absent ones were not requested for
/// the requester's role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSections {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Section<Option<UserProfile>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Section<Vec<TaskItem>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moods: Option<Section<Vec<MoodEntry>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journals: Option<Section<Vec<JournalEntry>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_links: Option<Section<Vec<TaskJournalLink>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Section<Vec<UserProfile>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_tasks: Option<Section<Vec<TaskItem>>>,
}

impl DashboardSections {
    /// Status of every present section, in a stable order.
    pub fn statuses(&self) -> Vec<(ResourceKind, &SectionStatus)> {
        let mut out = Vec::new();
        if let Some(s) = &self.profile {
            out.push((ResourceKind::Profile, &s.status));
        }
        if let Some(s) = &self.tasks {
            out.push((ResourceKind::Tasks, &s.status));
        }
        if let Some(s) = &self.moods {
            out.push((ResourceKind::Moods, &s.status));
        }
        if let Some(s) = &self.journals {
            out.push((ResourceKind::Journals, &s.status));
        }
        if let Some(s) = &self.journal_links {
            out.push((ResourceKind::JournalLinks, &s.status));
        }
        if let Some(s) = &self.team {
            out.push((ResourceKind::Team, &s.status));
        }
        if let Some(s) = &self.team_tasks {
            out.push((ResourceKind::TeamTasks, &s.status));
        }
        out
    }

    pub fn status_of(&self, kind: ResourceKind) -> Option<&SectionStatus> {
        self.statuses()
            .into_iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, status)| status)
    }
}

/// Why a section was degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDiagnostic {
    pub section: ResourceKind,
    pub reason: FailureKind,
    pub message: String,
}

// ============================================================================
// DASHBOARD VIEW
// ============================================================================

/// The composed response for one inbound dashboard request.
///
/// No aggregate usability verdict is computed; callers inspect per-section
/// status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub summary: Identity,
    pub sections: DashboardSections,
    #[serde(default)]
    pub diagnostics: Vec<SectionDiagnostic>,
}

impl DashboardView {
    /// Build a view, deriving diagnostics from the section statuses.
    pub fn new(summary: Identity, sections: DashboardSections) -> Self {
        let diagnostics = sections
            .statuses()
            .into_iter()
            .filter_map(|(section, status)| match status {
                SectionStatus::Fulfilled => None,
                SectionStatus::Degraded { reason, message } => Some(SectionDiagnostic {
                    section,
                    reason: *reason,
                    message: message.clone(),
                }),
            })
            .collect();

        Self {
            summary,
            sections,
            diagnostics,
        }
    }

    pub fn is_fully_fulfilled(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn degraded_sections(&self) -> Vec<ResourceKind> {
        self.diagnostics.iter().map(|d| d.section).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_from_result_tracks_outcome() {
        let ok: Section<Vec<u8>> = Section::from_result(DownstreamResult::Success(vec![1, 2]));
        assert!(ok.is_fulfilled());
        assert_eq!(ok.data, vec![1, 2]);

        let timed_out: Section<Vec<u8>> = Section::from_result(DownstreamResult::TimedOut);
        assert!(!timed_out.is_fulfilled());
        assert!(timed_out.data.is_empty());
        assert!(matches!(
            timed_out.status,
            SectionStatus::Degraded { reason: FailureKind::TimedOut, .. }
        ));
    }

    #[test]
    fn test_view_diagnostics_follow_sections() {
        let sections = DashboardSections {
            tasks: Some(Section::fulfilled(Vec::new())),
            moods: Some(Section::degraded(FailureKind::Transport, "503")),
            ..Default::default()
        };
        let view = DashboardView::new(Identity::new("u-1", Role::Developer), sections);

        assert!(!view.is_fully_fulfilled());
        assert_eq!(view.degraded_sections(), vec![ResourceKind::Moods]);
        assert_eq!(view.diagnostics[0].reason, FailureKind::Transport);
        assert_eq!(
            view.sections.status_of(ResourceKind::Tasks),
            Some(&SectionStatus::Fulfilled)
        );
        assert!(view.sections.status_of(ResourceKind::Team).is_none());
    }

    #[test]
    fn test_view_serializes_status_per_section() {
        let sections = DashboardSections {
            moods: Some(Section::degraded(FailureKind::TimedOut, "deadline exceeded")),
            ..Default::default()
        };
        let view = DashboardView::new(Identity::new("u-1", Role::Developer), sections);
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["sections"]["moods"]["status"]["state"], "degraded");
        assert_eq!(json["sections"]["moods"]["status"]["reason"], "timed_out");
        assert!(json["sections"].get("tasks").is_none());
        assert_eq!(json["summary"]["role"], "developer");
    }
}
