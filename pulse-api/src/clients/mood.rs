//! Mood service client.

use async_trait::async_trait;
use pulse_core::{DownstreamRequest, DownstreamResult, MoodEntry, ServiceKind};

use super::{CallContext, ServiceClient};

#[async_trait]
pub trait MoodService: Send + Sync {
    /// `GET /api/moods/user/{id}`
    async fn moods_for_user(&self, ctx: &CallContext, user_id: &str) -> DownstreamResult<Vec<MoodEntry>>;
}

#[derive(Debug, Clone)]
pub struct HttpMoodService {
    inner: ServiceClient,
}

impl HttpMoodService {
    pub fn new(inner: ServiceClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl MoodService for HttpMoodService {
    async fn moods_for_user(&self, ctx: &CallContext, user_id: &str) -> DownstreamResult<Vec<MoodEntry>> {
        let request = DownstreamRequest::get(
            ServiceKind::Mood,
            "moods_for_user",
            format!("/api/moods/user/{}", user_id),
        )
        .with_identity(user_id);
        self.inner.call(request, ctx).await
    }
}
