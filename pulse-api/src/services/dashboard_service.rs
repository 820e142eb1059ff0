//! Dashboard Service
//!
//! Composes one inbound dashboard request out of the downstream entity
//! services. Identity resolution is the only fatal step; every other call
//! outcome lands in a section whose status mirrors it.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pulse_cache::{CacheConfig, CacheKey, CacheStats, Lookup, ResponseCache};
use pulse_core::{
    Cancellation, CompositionError, ConfigError, Credential, DashboardSections, DashboardView,
    DownstreamResult, FailureKind, Identity, JournalEntry, MoodEntry, NewTask, ResourceKind, Role,
    Section, TaskItem, TaskJournalLink, UserProfile,
};
use uuid::Uuid;

use crate::clients::{CallContext, Downstreams};
use crate::config::{IdentityMode, OrchestratorConfig};
use crate::constants::DEFAULT_REQUEST_TIMEOUT;
use crate::identity::{IdentityResolver, JwtIdentityResolver, RemoteIdentityResolver};
use crate::telemetry::metrics::with_metrics;

// ============================================================================
// SECTION CACHES
// ============================================================================

/// One typed response cache per payload shape. Keys carry the resource kind,
/// so `tasks` holds both the requester's own tasks and their team's tasks.
pub struct SectionCaches {
    profiles: ResponseCache<UserProfile>,
    users: ResponseCache<Vec<UserProfile>>,
    tasks: ResponseCache<Vec<TaskItem>>,
    moods: ResponseCache<Vec<MoodEntry>>,
    journals: ResponseCache<Vec<JournalEntry>>,
    links: ResponseCache<Vec<TaskJournalLink>>,
}

impl SectionCaches {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            profiles: ResponseCache::new(config.clone()),
            users: ResponseCache::new(config.clone()),
            tasks: ResponseCache::new(config.clone()),
            moods: ResponseCache::new(config.clone()),
            journals: ResponseCache::new(config.clone()),
            links: ResponseCache::new(config),
        }
    }

    /// Drop every entry cached on behalf of `user_id`.
    pub fn invalidate_identity(&self, user_id: &str) -> u64 {
        self.profiles.invalidate_identity(user_id)
            + self.users.invalidate_identity(user_id)
            + self.tasks.invalidate_identity(user_id)
            + self.moods.invalidate_identity(user_id)
            + self.journals.invalidate_identity(user_id)
            + self.links.invalidate_identity(user_id)
    }

    pub fn purge_expired(&self) -> u64 {
        self.profiles.purge_expired()
            + self.users.purge_expired()
            + self.tasks.purge_expired()
            + self.moods.purge_expired()
            + self.journals.purge_expired()
            + self.links.purge_expired()
    }

    /// Combined counters across every typed cache.
    pub fn stats(&self) -> CacheStats {
        [
            self.profiles.stats(),
            self.users.stats(),
            self.tasks.stats(),
            self.moods.stats(),
            self.journals.stats(),
            self.links.stats(),
        ]
        .into_iter()
        .sum()
    }
}

/// Serve `resource` for `identity` from `cache`, fetching on a miss, and
/// give up with `TimedOut` once `cancel` fires.
async fn cached<V, F, Fut>(
    cache: &ResponseCache<V>,
    resource: ResourceKind,
    identity: &str,
    cancel: &Cancellation,
    fetch: F,
) -> DownstreamResult<V>
where
    V: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = DownstreamResult<V>>,
{
    cached_with_lookup(cache, resource, identity, cancel, fetch).await.0
}

/// Like [`cached`], also reporting how the lookup was served. The lookup is
/// `None` when `cancel` fired first.
async fn cached_with_lookup<V, F, Fut>(
    cache: &ResponseCache<V>,
    resource: ResourceKind,
    identity: &str,
    cancel: &Cancellation,
    fetch: F,
) -> (DownstreamResult<V>, Option<Lookup>)
where
    V: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = DownstreamResult<V>>,
{
    let key = CacheKey::new(resource, identity);
    tokio::select! {
        (result, lookup) = cache.get_or_fetch_with_outcome(&key, fetch) => {
            with_metrics(|m| m.record_cache_lookup(resource.as_str(), lookup.as_str()));
            (result, Some(lookup))
        }
        _ = cancel.cancelled() => (DownstreamResult::TimedOut, None),
    }
}

/// Whether this request fetched a fresh prerequisite list, so a dependent
/// entry cached against the previous list must not be served.
fn refetched<T>(result: &DownstreamResult<T>, lookup: Option<Lookup>) -> bool {
    result.is_success() && lookup == Some(Lookup::Miss)
}

/// Ids a dependent call needs from its prerequisite, or the degraded result
/// the dependent section inherits when the prerequisite failed.
fn prerequisite_ids<T, U>(
    prerequisite: ResourceKind,
    result: &DownstreamResult<Vec<T>>,
    id_of: impl Fn(&T) -> Uuid,
) -> Result<Vec<String>, DownstreamResult<U>> {
    match result {
        DownstreamResult::Success(items) => {
            Ok(items.iter().map(|item| id_of(item).to_string()).collect())
        }
        other => {
            let kind = other.failure_kind().unwrap_or(FailureKind::TimedOut);
            let message = other.failure_message().unwrap_or("deadline exceeded");
            Err(DownstreamResult::failure(
                kind,
                format!("depends on {}: {}", prerequisite, message),
            ))
        }
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// The dashboard aggregator with its downstream clients, caches and
/// identity resolver. Built once at startup and shared across requests.
pub struct Orchestrator {
    downstreams: Downstreams,
    identity: Arc<dyn IdentityResolver>,
    caches: SectionCaches,
    request_timeout: Duration,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Wire HTTP clients and the configured identity resolver.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client
    /// cannot be constructed.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "http_client".to_string(),
                value: String::new(),
                reason: e.to_string(),
            })?;
        let downstreams = Downstreams::http(config, client);

        let identity: Arc<dyn IdentityResolver> = match config.identity_mode {
            IdentityMode::Jwt => {
                let secret = config.jwt_secret.clone().ok_or_else(|| ConfigError::MissingRequired {
                    field: "PULSE_JWT_SECRET".to_string(),
                })?;
                Arc::new(JwtIdentityResolver::new(secret))
            }
            IdentityMode::Remote => {
                Arc::new(RemoteIdentityResolver::new(Arc::clone(&downstreams.users)))
            }
        };

        Self::builder()
            .downstreams(downstreams)
            .identity_resolver(identity)
            .cache_config(config.cache.clone())
            .request_timeout(config.request_timeout)
            .build()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.caches.stats()
    }

    pub fn purge_expired(&self) -> u64 {
        self.caches.purge_expired()
    }

    /// Resolve the requester from `credential` and compose their dashboard.
    ///
    /// The whole composition is bounded by the request timeout on top of
    /// `cancel`.
    ///
    /// # Errors
    /// Returns [`CompositionError::Identity`] if the requester cannot be
    /// identified; no section call is issued in that case.
    pub async fn compose_dashboard(
        &self,
        credential: Option<Credential>,
        cancel: Cancellation,
    ) -> Result<DashboardView, CompositionError> {
        let cancel = cancel.with_timeout(self.request_timeout);
        let identity = self.resolve(credential.as_ref(), &cancel).await?;
        Ok(self.compose(identity, credential, cancel).await)
    }

    /// Compose the dashboard of an already-resolved `identity`. Never fails;
    /// section statuses carry every downstream problem.
    pub async fn compose(
        &self,
        identity: Identity,
        credential: Option<Credential>,
        cancel: Cancellation,
    ) -> DashboardView {
        let start = Instant::now();
        let ctx = CallContext::new(credential, cancel);
        let sections = self.sections_for(&identity, &ctx).await;
        let view = DashboardView::new(identity, sections);

        for (section, status) in view.sections.statuses() {
            with_metrics(|m| m.record_section(section.as_str(), status.label()));
        }
        tracing::info!(
            user_id = %view.summary.user_id,
            role = %view.summary.role,
            degraded = view.diagnostics.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Dashboard composed"
        );
        view
    }

    /// Forward a task creation, busting the task entries it makes stale.
    ///
    /// # Errors
    /// Returns [`CompositionError::Identity`] if the requester cannot be
    /// identified; the write is not attempted.
    pub async fn create_task(
        &self,
        credential: Option<Credential>,
        cancel: Cancellation,
        task: NewTask,
        idempotency_key: Option<String>,
    ) -> Result<DownstreamResult<TaskItem>, CompositionError> {
        let cancel = cancel.with_timeout(self.request_timeout);
        let identity = self.resolve(credential.as_ref(), &cancel).await?;
        let ctx = CallContext::new(credential, cancel);

        let result = self
            .downstreams
            .tasks
            .create_task(&ctx, &task, idempotency_key.as_deref())
            .await;

        if result.is_success() {
            let requester = identity.user_id.as_str();
            self.caches.tasks.invalidate(&CacheKey::new(ResourceKind::Tasks, requester));
            self.caches.tasks.invalidate(&CacheKey::new(ResourceKind::TeamTasks, requester));
            if let Some(assignee) = task.assignee_id {
                self.caches
                    .tasks
                    .invalidate(&CacheKey::new(ResourceKind::Tasks, assignee.to_string()));
            }
        }
        Ok(result)
    }

    /// Drop every cached entry belonging to the requester.
    ///
    /// # Errors
    /// Returns [`CompositionError::Identity`] if the requester cannot be
    /// identified.
    pub async fn bust_cache(
        &self,
        credential: Option<Credential>,
        cancel: Cancellation,
    ) -> Result<u64, CompositionError> {
        let cancel = cancel.with_timeout(self.request_timeout);
        let identity = self.resolve(credential.as_ref(), &cancel).await?;
        let removed = self.caches.invalidate_identity(&identity.user_id);
        tracing::debug!(user_id = %identity.user_id, removed, "Dashboard cache busted");
        Ok(removed)
    }

    async fn resolve(
        &self,
        credential: Option<&Credential>,
        cancel: &Cancellation,
    ) -> Result<Identity, CompositionError> {
        self.identity.resolve(credential, cancel).await.map_err(|e| {
            tracing::warn!(error = %e, "Identity resolution failed");
            CompositionError::Identity(e)
        })
    }

    // ------------------------------------------------------------------------
    // Call sets
    // ------------------------------------------------------------------------

    /// Issue the role's call set. The sections present in the result must
    /// match [`Role::dashboard_sections`] for `identity.role`.
    async fn sections_for(&self, identity: &Identity, ctx: &CallContext) -> DashboardSections {
        let id = identity.user_id.as_str();
        match identity.role {
            Role::Developer => {
                let (profile, tasks, moods, (journals, links)) = tokio::join!(
                    self.profile(ctx, id),
                    self.tasks(ctx, id),
                    self.moods(ctx, id),
                    self.journals_with_links(ctx, id),
                );
                DashboardSections {
                    profile: Some(Section::from_result(profile.map(Some))),
                    tasks: Some(Section::from_result(tasks)),
                    moods: Some(Section::from_result(moods)),
                    journals: Some(Section::from_result(journals)),
                    journal_links: Some(Section::from_result(links)),
                    ..Default::default()
                }
            }
            Role::Manager => {
                let (profile, tasks, (team, team_tasks)) = tokio::join!(
                    self.profile(ctx, id),
                    self.tasks(ctx, id),
                    self.team_with_tasks(ctx, id),
                );
                DashboardSections {
                    profile: Some(Section::from_result(profile.map(Some))),
                    tasks: Some(Section::from_result(tasks)),
                    team: Some(Section::from_result(team)),
                    team_tasks: Some(Section::from_result(team_tasks)),
                    ..Default::default()
                }
            }
            Role::Admin => {
                let (profile, team, tasks) = tokio::join!(
                    self.profile(ctx, id),
                    self.all_users(ctx, id),
                    self.tasks(ctx, id),
                );
                DashboardSections {
                    profile: Some(Section::from_result(profile.map(Some))),
                    team: Some(Section::from_result(team)),
                    tasks: Some(Section::from_result(tasks)),
                    ..Default::default()
                }
            }
        }
    }

    async fn profile(&self, ctx: &CallContext, id: &str) -> DownstreamResult<UserProfile> {
        cached(&self.caches.profiles, ResourceKind::Profile, id, ctx.cancel(), || {
            self.downstreams.users.profile(ctx, id)
        })
        .await
    }

    async fn tasks(&self, ctx: &CallContext, id: &str) -> DownstreamResult<Vec<TaskItem>> {
        cached(&self.caches.tasks, ResourceKind::Tasks, id, ctx.cancel(), || {
            self.downstreams.tasks.tasks_for_user(ctx, id)
        })
        .await
    }

    async fn moods(&self, ctx: &CallContext, id: &str) -> DownstreamResult<Vec<MoodEntry>> {
        cached(&self.caches.moods, ResourceKind::Moods, id, ctx.cancel(), || {
            self.downstreams.moods.moods_for_user(ctx, id)
        })
        .await
    }

    async fn all_users(&self, ctx: &CallContext, id: &str) -> DownstreamResult<Vec<UserProfile>> {
        cached(&self.caches.users, ResourceKind::Team, id, ctx.cancel(), || {
            self.downstreams.users.all_users(ctx)
        })
        .await
    }

    async fn journals_with_links(
        &self,
        ctx: &CallContext,
        id: &str,
    ) -> (
        DownstreamResult<Vec<JournalEntry>>,
        DownstreamResult<Vec<TaskJournalLink>>,
    ) {
        let (journals, lookup) =
            cached_with_lookup(&self.caches.journals, ResourceKind::Journals, id, ctx.cancel(), || {
                self.downstreams.journals.journals_for_user(ctx, id)
            })
            .await;
        if refetched(&journals, lookup) {
            self.caches
                .links
                .invalidate(&CacheKey::new(ResourceKind::JournalLinks, id));
        }

        let links = match prerequisite_ids(ResourceKind::Journals, &journals, |j: &JournalEntry| j.id) {
            Err(degraded) => degraded,
            Ok(ids) if ids.is_empty() => DownstreamResult::Success(Vec::new()),
            Ok(ids) => {
                cached(&self.caches.links, ResourceKind::JournalLinks, id, ctx.cancel(), || {
                    self.downstreams.links.links_for_journals(ctx, &ids)
                })
                .await
            }
        };
        (journals, links)
    }

    async fn team_with_tasks(
        &self,
        ctx: &CallContext,
        id: &str,
    ) -> (DownstreamResult<Vec<UserProfile>>, DownstreamResult<Vec<TaskItem>>) {
        let (team, lookup) =
            cached_with_lookup(&self.caches.users, ResourceKind::Team, id, ctx.cancel(), || {
                self.downstreams.users.team(ctx, id)
            })
            .await;
        if refetched(&team, lookup) {
            self.caches
                .tasks
                .invalidate(&CacheKey::new(ResourceKind::TeamTasks, id));
        }

        let team_tasks = match prerequisite_ids(ResourceKind::Team, &team, |u: &UserProfile| u.id) {
            Err(degraded) => degraded,
            Ok(ids) if ids.is_empty() => DownstreamResult::Success(Vec::new()),
            Ok(ids) => {
                cached(&self.caches.tasks, ResourceKind::TeamTasks, id, ctx.cancel(), || {
                    self.downstreams.tasks.tasks_for_assignees(ctx, &ids)
                })
                .await
            }
        };
        (team, team_tasks)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("request_timeout", &self.request_timeout)
            .field("cache", &self.caches.stats())
            .finish()
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Explicit startup wiring for [`Orchestrator`].
pub struct OrchestratorBuilder {
    downstreams: Option<Downstreams>,
    identity: Option<Arc<dyn IdentityResolver>>,
    cache: CacheConfig,
    request_timeout: Duration,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            downstreams: None,
            identity: None,
            cache: CacheConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn downstreams(mut self, downstreams: Downstreams) -> Self {
        self.downstreams = Some(downstreams);
        self
    }

    pub fn identity_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.identity = Some(resolver);
        self
    }

    pub fn cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// # Errors
    /// Returns error if a collaborator is missing or a setting is invalid.
    pub fn build(self) -> Result<Orchestrator, ConfigError> {
        let downstreams = self.downstreams.ok_or_else(|| ConfigError::MissingRequired {
            field: "downstreams".to_string(),
        })?;
        let identity = self.identity.ok_or_else(|| ConfigError::MissingRequired {
            field: "identity_resolver".to_string(),
        })?;
        self.cache.validate()?;
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Orchestrator {
            downstreams,
            identity,
            caches: SectionCaches::new(self.cache),
            request_timeout: self.request_timeout,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
