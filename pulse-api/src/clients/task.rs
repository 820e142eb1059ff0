//! Task service client.

use async_trait::async_trait;
use pulse_core::{DownstreamRequest, DownstreamResult, NewTask, ServiceKind, TaskItem};

use super::{CallContext, ServiceClient};

#[async_trait]
pub trait TaskService: Send + Sync {
    /// `GET /api/tasks/user/{id}`
    async fn tasks_for_user(&self, ctx: &CallContext, user_id: &str) -> DownstreamResult<Vec<TaskItem>>;

    /// `GET /api/tasks?assignees=a,b`
    async fn tasks_for_assignees(
        &self,
        ctx: &CallContext,
        assignee_ids: &[String],
    ) -> DownstreamResult<Vec<TaskItem>>;

    /// `POST /api/tasks`. Retried only when `idempotency_key` is present.
    async fn create_task(
        &self,
        ctx: &CallContext,
        task: &NewTask,
        idempotency_key: Option<&str>,
    ) -> DownstreamResult<TaskItem>;
}

#[derive(Debug, Clone)]
pub struct HttpTaskService {
    inner: ServiceClient,
}

impl HttpTaskService {
    pub fn new(inner: ServiceClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TaskService for HttpTaskService {
    async fn tasks_for_user(&self, ctx: &CallContext, user_id: &str) -> DownstreamResult<Vec<TaskItem>> {
        let request = DownstreamRequest::get(
            ServiceKind::Task,
            "tasks_for_user",
            format!("/api/tasks/user/{}", user_id),
        )
        .with_identity(user_id);
        self.inner.call(request, ctx).await
    }

    async fn tasks_for_assignees(
        &self,
        ctx: &CallContext,
        assignee_ids: &[String],
    ) -> DownstreamResult<Vec<TaskItem>> {
        let request = assignee_ids.iter().fold(
            DownstreamRequest::get(ServiceKind::Task, "tasks_for_assignees", "/api/tasks")
                .with_query("assignees", assignee_ids.join(",")),
            |request, id| request.with_identity(id.as_str()),
        );
        self.inner.call(request, ctx).await
    }

    async fn create_task(
        &self,
        ctx: &CallContext,
        task: &NewTask,
        idempotency_key: Option<&str>,
    ) -> DownstreamResult<TaskItem> {
        let body = match serde_json::to_value(task) {
            Ok(body) => body,
            Err(e) => return DownstreamResult::invalid_input(format!("Unserializable task: {}", e)),
        };
        let mut request = DownstreamRequest::post(ServiceKind::Task, "create_task", "/api/tasks", body);
        if let Some(key) = idempotency_key {
            request = request.with_idempotency_key(key);
        }
        self.inner.call(request, ctx).await
    }
}
