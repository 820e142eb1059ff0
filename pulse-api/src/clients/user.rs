//! User service client.

use async_trait::async_trait;
use pulse_core::{DownstreamRequest, DownstreamResult, ServiceKind, UserProfile};

use super::{CallContext, ServiceClient};

/// Profiles and reporting lines, owned by the user service.
#[async_trait]
pub trait UserService: Send + Sync {
    /// `GET /api/users/{id}`
    async fn profile(&self, ctx: &CallContext, user_id: &str) -> DownstreamResult<UserProfile>;

    /// `GET /api/users/{id}/team`: direct reports of a manager.
    async fn team(&self, ctx: &CallContext, manager_id: &str) -> DownstreamResult<Vec<UserProfile>>;

    /// `GET /api/users`
    async fn all_users(&self, ctx: &CallContext) -> DownstreamResult<Vec<UserProfile>>;

    /// `GET /api/users/me`: the owner of the forwarded credential.
    async fn current_user(&self, ctx: &CallContext) -> DownstreamResult<UserProfile>;
}

#[derive(Debug, Clone)]
pub struct HttpUserService {
    inner: ServiceClient,
}

impl HttpUserService {
    pub fn new(inner: ServiceClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl UserService for HttpUserService {
    async fn profile(&self, ctx: &CallContext, user_id: &str) -> DownstreamResult<UserProfile> {
        let request =
            DownstreamRequest::get(ServiceKind::User, "profile", format!("/api/users/{}", user_id))
                .with_identity(user_id);
        self.inner.call(request, ctx).await
    }

    async fn team(&self, ctx: &CallContext, manager_id: &str) -> DownstreamResult<Vec<UserProfile>> {
        let request = DownstreamRequest::get(
            ServiceKind::User,
            "team",
            format!("/api/users/{}/team", manager_id),
        )
        .with_identity(manager_id);
        self.inner.call(request, ctx).await
    }

    async fn all_users(&self, ctx: &CallContext) -> DownstreamResult<Vec<UserProfile>> {
        let request = DownstreamRequest::get(ServiceKind::User, "all_users", "/api/users");
        self.inner.call(request, ctx).await
    }

    async fn current_user(&self, ctx: &CallContext) -> DownstreamResult<UserProfile> {
        let request = DownstreamRequest::get(ServiceKind::User, "current_user", "/api/users/me");
        self.inner.call(request, ctx).await
    }
}
