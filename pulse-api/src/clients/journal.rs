//! Journal service client.

use async_trait::async_trait;
use pulse_core::{DownstreamRequest, DownstreamResult, JournalEntry, ServiceKind};

use super::{CallContext, ServiceClient};

#[async_trait]
pub trait JournalService: Send + Sync {
    /// `GET /api/journals/user/{id}`
    async fn journals_for_user(
        &self,
        ctx: &CallContext,
        user_id: &str,
    ) -> DownstreamResult<Vec<JournalEntry>>;
}

#[derive(Debug, Clone)]
pub struct HttpJournalService {
    inner: ServiceClient,
}

impl HttpJournalService {
    pub fn new(inner: ServiceClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl JournalService for HttpJournalService {
    async fn journals_for_user(
        &self,
        ctx: &CallContext,
        user_id: &str,
    ) -> DownstreamResult<Vec<JournalEntry>> {
        let request = DownstreamRequest::get(
            ServiceKind::Journal,
            "journals_for_user",
            format!("/api/journals/user/{}", user_id),
        )
        .with_identity(user_id);
        self.inner.call(request, ctx).await
    }
}
