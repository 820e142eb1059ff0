//! PULSE Test Utilities
//!
//! Centralized test infrastructure for the PULSE workspace:
//! - Scripted fakes for every downstream service and the identity resolver
//! - Proptest generators for payloads and outcomes
//! - Test fixtures for common scenarios
//! - Custom assertions for composed views

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use pulse_api::{
    CallContext, Downstreams, IdentityResolver, JournalService, LinkService, MoodService,
    TaskService, UserService,
};
use pulse_core::{
    AuthError, Cancellation, Credential, DownstreamResult, FailureKind, Identity, JournalEntry,
    MoodEntry, NewTask, TaskItem, TaskJournalLink, UserProfile,
};

pub use pulse_core::{DashboardView, ResourceKind, Role, SectionStatus};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// SCRIPTED SERVICE
// ============================================================================

/// One scripted downstream operation.
///
/// Queued results are returned first, in order; after that every call gets
/// the fallback. Each call is counted, and the forwarded credential and
/// arguments of the last call are kept for assertions.
pub struct ScriptedService<T> {
    queue: Mutex<VecDeque<DownstreamResult<T>>>,
    fallback: Mutex<DownstreamResult<T>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicU32,
    last_credential: Mutex<Option<String>>,
    last_args: Mutex<Vec<String>>,
}

impl<T: Clone + Send> ScriptedService<T> {
    pub fn new(fallback: DownstreamResult<T>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            delay: Mutex::new(None),
            calls: AtomicU32::new(0),
            last_credential: Mutex::new(None),
            last_args: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(value: T) -> Self {
        Self::new(DownstreamResult::Success(value))
    }

    pub fn failing(kind: FailureKind, message: &str) -> Self {
        Self::new(DownstreamResult::failure(kind, message))
    }

    pub fn timing_out() -> Self {
        Self::new(DownstreamResult::TimedOut)
    }

    /// Queue `result` ahead of the fallback.
    pub fn then(self, result: DownstreamResult<T>) -> Self {
        self.push(result);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    pub fn push(&self, result: DownstreamResult<T>) {
        lock(&self.queue).push_back(result);
    }

    pub fn set_fallback(&self, result: DownstreamResult<T>) {
        *lock(&self.fallback) = result;
    }

    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_credential(&self) -> Option<String> {
        lock(&self.last_credential).clone()
    }

    pub fn last_args(&self) -> Vec<String> {
        lock(&self.last_args).clone()
    }

    /// Record the call and answer it. A configured delay races the caller's
    /// cancellation, which yields `TimedOut`.
    pub async fn respond(&self, ctx: &CallContext, args: &[&str]) -> DownstreamResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_credential) = ctx.credential().map(|c| c.header_value().to_string());
        *lock(&self.last_args) = args.iter().map(|a| a.to_string()).collect();

        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.cancel().cancelled() => return DownstreamResult::TimedOut,
            }
        }

        let queued = lock(&self.queue).pop_front();
        match queued {
            Some(result) => result,
            None => lock(&self.fallback).clone(),
        }
    }
}

// ============================================================================
// FAKE DOWNSTREAM SERVICES
// ============================================================================

pub struct FakeUserService {
    pub profile: ScriptedService<UserProfile>,
    pub team: ScriptedService<Vec<UserProfile>>,
    pub all_users: ScriptedService<Vec<UserProfile>>,
    pub current_user: ScriptedService<UserProfile>,
}

impl FakeUserService {
    pub fn calls(&self) -> u32 {
        self.profile.calls() + self.team.calls() + self.all_users.calls() + self.current_user.calls()
    }
}

#[async_trait]
impl UserService for FakeUserService {
    async fn profile(&self, ctx: &CallContext, user_id: &str) -> DownstreamResult<UserProfile> {
        self.profile.respond(ctx, &[user_id]).await
    }

    async fn team(&self, ctx: &CallContext, manager_id: &str) -> DownstreamResult<Vec<UserProfile>> {
        self.team.respond(ctx, &[manager_id]).await
    }

    async fn all_users(&self, ctx: &CallContext) -> DownstreamResult<Vec<UserProfile>> {
        self.all_users.respond(ctx, &[]).await
    }

    async fn current_user(&self, ctx: &CallContext) -> DownstreamResult<UserProfile> {
        self.current_user.respond(ctx, &[]).await
    }
}

pub struct FakeTaskService {
    pub tasks_for_user: ScriptedService<Vec<TaskItem>>,
    pub tasks_for_assignees: ScriptedService<Vec<TaskItem>>,
    pub create_task: ScriptedService<TaskItem>,
}

impl FakeTaskService {
    pub fn calls(&self) -> u32 {
        self.tasks_for_user.calls() + self.tasks_for_assignees.calls() + self.create_task.calls()
    }
}

#[async_trait]
impl TaskService for FakeTaskService {
    async fn tasks_for_user(&self, ctx: &CallContext, user_id: &str) -> DownstreamResult<Vec<TaskItem>> {
        self.tasks_for_user.respond(ctx, &[user_id]).await
    }

    async fn tasks_for_assignees(
        &self,
        ctx: &CallContext,
        assignee_ids: &[String],
    ) -> DownstreamResult<Vec<TaskItem>> {
        let args: Vec<&str> = assignee_ids.iter().map(String::as_str).collect();
        self.tasks_for_assignees.respond(ctx, &args).await
    }

    async fn create_task(
        &self,
        ctx: &CallContext,
        task: &NewTask,
        idempotency_key: Option<&str>,
    ) -> DownstreamResult<TaskItem> {
        let mut args = vec![task.title.as_str()];
        args.extend(idempotency_key);
        self.create_task.respond(ctx, &args).await
    }
}

pub struct FakeMoodService {
    pub moods_for_user: ScriptedService<Vec<MoodEntry>>,
}

#[async_trait]
impl MoodService for FakeMoodService {
    async fn moods_for_user(&self, ctx: &CallContext, user_id: &str) -> DownstreamResult<Vec<MoodEntry>> {
        self.moods_for_user.respond(ctx, &[user_id]).await
    }
}

pub struct FakeJournalService {
    pub journals_for_user: ScriptedService<Vec<JournalEntry>>,
}

#[async_trait]
impl JournalService for FakeJournalService {
    async fn journals_for_user(
        &self,
        ctx: &CallContext,
        user_id: &str,
    ) -> DownstreamResult<Vec<JournalEntry>> {
        self.journals_for_user.respond(ctx, &[user_id]).await
    }
}

pub struct FakeLinkService {
    pub links_for_journals: ScriptedService<Vec<TaskJournalLink>>,
}

#[async_trait]
impl LinkService for FakeLinkService {
    async fn links_for_journals(
        &self,
        ctx: &CallContext,
        journal_ids: &[String],
    ) -> DownstreamResult<Vec<TaskJournalLink>> {
        let args: Vec<&str> = journal_ids.iter().map(String::as_str).collect();
        self.links_for_journals.respond(ctx, &args).await
    }
}

/// Every fake downstream, kept alongside the [`Downstreams`] handed to the
/// orchestrator so tests can script and inspect them.
#[derive(Clone)]
pub struct FakeDownstreams {
    pub users: Arc<FakeUserService>,
    pub tasks: Arc<FakeTaskService>,
    pub moods: Arc<FakeMoodService>,
    pub journals: Arc<FakeJournalService>,
    pub links: Arc<FakeLinkService>,
}

impl FakeDownstreams {
    /// Every service answers successfully with fixture data for `user_id`.
    pub fn healthy(user_id: uuid::Uuid) -> Self {
        let journals = fixtures::journals(user_id, 2);
        let journal_ids: Vec<uuid::Uuid> = journals.iter().map(|j| j.id).collect();
        let team = vec![
            fixtures::profile(uuid::Uuid::now_v7(), Role::Developer),
            fixtures::profile(uuid::Uuid::now_v7(), Role::Developer),
        ];

        Self {
            users: Arc::new(FakeUserService {
                profile: ScriptedService::succeeding(fixtures::profile(user_id, Role::Developer)),
                team: ScriptedService::succeeding(team.clone()),
                all_users: ScriptedService::succeeding(team),
                current_user: ScriptedService::succeeding(fixtures::profile(user_id, Role::Developer)),
            }),
            tasks: Arc::new(FakeTaskService {
                tasks_for_user: ScriptedService::succeeding(fixtures::tasks(user_id, 3)),
                tasks_for_assignees: ScriptedService::succeeding(fixtures::tasks(user_id, 2)),
                create_task: ScriptedService::succeeding(fixtures::task(user_id, "created")),
            }),
            moods: Arc::new(FakeMoodService {
                moods_for_user: ScriptedService::succeeding(fixtures::moods(user_id, 2)),
            }),
            journals: Arc::new(FakeJournalService {
                journals_for_user: ScriptedService::succeeding(journals),
            }),
            links: Arc::new(FakeLinkService {
                links_for_journals: ScriptedService::succeeding(fixtures::links(&journal_ids)),
            }),
        }
    }

    pub fn downstreams(&self) -> Downstreams {
        Downstreams {
            users: self.users.clone(),
            tasks: self.tasks.clone(),
            moods: self.moods.clone(),
            journals: self.journals.clone(),
            links: self.links.clone(),
        }
    }

    /// Calls issued across every fake service.
    pub fn total_calls(&self) -> u32 {
        self.users.calls()
            + self.tasks.calls()
            + self.moods.moods_for_user.calls()
            + self.journals.journals_for_user.calls()
            + self.links.links_for_journals.calls()
    }
}

// ============================================================================
// FAKE IDENTITY RESOLVER
// ============================================================================

/// Resolves every request to a fixed identity or a fixed error.
pub struct FakeIdentityResolver {
    outcome: Result<Identity, AuthError>,
    calls: AtomicU32,
    last_credential: Mutex<Option<String>>,
}

impl FakeIdentityResolver {
    pub fn resolving(identity: Identity) -> Self {
        Self::with_outcome(Ok(identity))
    }

    pub fn failing(error: AuthError) -> Self {
        Self::with_outcome(Err(error))
    }

    fn with_outcome(outcome: Result<Identity, AuthError>) -> Self {
        Self {
            outcome,
            calls: AtomicU32::new(0),
            last_credential: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_credential(&self) -> Option<String> {
        lock(&self.last_credential).clone()
    }
}

#[async_trait]
impl IdentityResolver for FakeIdentityResolver {
    async fn resolve(
        &self,
        credential: Option<&Credential>,
        _cancel: &Cancellation,
    ) -> Result<Identity, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_credential) = credential.map(|c| c.header_value().to_string());
        self.outcome.clone()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for PULSE payloads and call outcomes.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_role() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::Developer), Just(Role::Manager), Just(Role::Admin)]
    }

    /// Failure kinds the retry policy treats as transient.
    pub fn arb_transient_kind() -> impl Strategy<Value = FailureKind> {
        prop_oneof![Just(FailureKind::Transport), Just(FailureKind::TimedOut)]
    }

    /// Failure kinds a section call can produce that are never retried.
    pub fn arb_permanent_kind() -> impl Strategy<Value = FailureKind> {
        prop_oneof![Just(FailureKind::InvalidInput), Just(FailureKind::Decode)]
    }

    /// Any failed outcome of a section call.
    pub fn arb_failed_result<T: Clone + std::fmt::Debug + 'static>(
    ) -> impl Strategy<Value = DownstreamResult<T>> {
        prop_oneof![
            Just(DownstreamResult::TimedOut),
            (
                prop_oneof![
                    Just(FailureKind::Transport),
                    Just(FailureKind::InvalidInput),
                    Just(FailureKind::Decode),
                ],
                "[a-z ]{1,24}"
            )
                .prop_map(|(kind, message)| DownstreamResult::failure(kind, message)),
        ]
    }

    /// A bare token or one already carrying a Bearer scheme.
    pub fn arb_inbound_token() -> impl Strategy<Value = (String, String)> {
        ("[A-Za-z0-9._-]{1,48}", prop_oneof![Just(""), Just("Bearer "), Just("bearer ")])
            .prop_map(|(token, scheme)| (token.clone(), format!("{}{}", scheme, token)))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built payloads for common scenarios.

    use super::*;
    use chrono::Utc;
    use pulse_core::{MoodLevel, TaskPriority, TaskStatus};
    use uuid::Uuid;

    pub fn identity(user_id: Uuid, role: Role) -> Identity {
        Identity::new(user_id.to_string(), role).with_display_name("Test User")
    }

    pub fn profile(id: Uuid, role: Role) -> UserProfile {
        UserProfile {
            id,
            username: format!("user-{}", &id.simple().to_string()[..8]),
            display_name: Some("Test User".to_string()),
            email: None,
            role,
            manager_id: None,
        }
    }

    pub fn task(assignee: Uuid, title: &str) -> TaskItem {
        TaskItem {
            id: Uuid::now_v7(),
            title: title.to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            assignee_id: Some(assignee),
            due_date: None,
            created_at: Utc::now(),
        }
    }

    pub fn tasks(assignee: Uuid, count: usize) -> Vec<TaskItem> {
        (0..count).map(|i| task(assignee, &format!("task {}", i + 1))).collect()
    }

    pub fn new_task(title: &str, assignee: Option<Uuid>) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: None,
            priority: TaskPriority::High,
            assignee_id: assignee,
            due_date: None,
        }
    }

    pub fn moods(user_id: Uuid, count: usize) -> Vec<MoodEntry> {
        (0..count)
            .map(|_| MoodEntry {
                id: Uuid::now_v7(),
                user_id,
                level: MoodLevel::Good,
                note: None,
                recorded_at: Utc::now(),
            })
            .collect()
    }

    pub fn journals(user_id: Uuid, count: usize) -> Vec<JournalEntry> {
        (0..count)
            .map(|i| JournalEntry {
                id: Uuid::now_v7(),
                user_id,
                title: format!("entry {}", i + 1),
                body: String::new(),
                mood: Some(MoodLevel::Okay),
                created_at: Utc::now(),
            })
            .collect()
    }

    pub fn links(journal_ids: &[Uuid]) -> Vec<TaskJournalLink> {
        journal_ids
            .iter()
            .map(|journal_id| TaskJournalLink {
                id: Uuid::now_v7(),
                task_id: Uuid::now_v7(),
                journal_id: *journal_id,
            })
            .collect()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over composed dashboard views.

    use super::*;

    #[track_caller]
    pub fn assert_fulfilled(view: &DashboardView, section: ResourceKind) {
        match view.sections.status_of(section) {
            Some(SectionStatus::Fulfilled) => {}
            other => panic!("Expected {} fulfilled, got: {:?}", section, other),
        }
    }

    #[track_caller]
    pub fn assert_degraded(view: &DashboardView, section: ResourceKind, kind: FailureKind) {
        match view.sections.status_of(section) {
            Some(SectionStatus::Degraded { reason, .. }) if *reason == kind => {}
            other => panic!("Expected {} degraded with {}, got: {:?}", section, kind, other),
        }
    }

    #[track_caller]
    pub fn assert_absent(view: &DashboardView, section: ResourceKind) {
        assert!(
            view.sections.status_of(section).is_none(),
            "Expected {} absent for role {}",
            section,
            view.summary.role
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_service_queue_then_fallback() {
        let script = ScriptedService::succeeding(7u8)
            .then(DownstreamResult::transport("503"))
            .then(DownstreamResult::TimedOut);
        let ctx = CallContext::new(Credential::from_header("abc"), Cancellation::never());

        assert_eq!(script.respond(&ctx, &["a"]).await.failure_kind(), Some(FailureKind::Transport));
        assert_eq!(script.respond(&ctx, &["b"]).await, DownstreamResult::TimedOut);
        assert_eq!(script.respond(&ctx, &["c"]).await, DownstreamResult::Success(7));
        assert_eq!(script.calls(), 3);
        assert_eq!(script.last_args(), vec!["c".to_string()]);
        assert_eq!(script.last_credential().as_deref(), Some("Bearer abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_delay_observes_cancellation() {
        let script = ScriptedService::succeeding(1u8).with_delay(Duration::from_secs(10));
        let cancel = Cancellation::never().with_timeout(Duration::from_millis(50));
        let ctx = CallContext::new(None, cancel);

        assert_eq!(script.respond(&ctx, &[]).await, DownstreamResult::TimedOut);
    }
}
