//! Task-journal link service client.

use async_trait::async_trait;
use pulse_core::{DownstreamRequest, DownstreamResult, ServiceKind, TaskJournalLink};

use super::{CallContext, ServiceClient};

#[async_trait]
pub trait LinkService: Send + Sync {
    /// `GET /api/task-journals?journal_ids=a,b`
    async fn links_for_journals(
        &self,
        ctx: &CallContext,
        journal_ids: &[String],
    ) -> DownstreamResult<Vec<TaskJournalLink>>;
}

#[derive(Debug, Clone)]
pub struct HttpLinkService {
    inner: ServiceClient,
}

impl HttpLinkService {
    pub fn new(inner: ServiceClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl LinkService for HttpLinkService {
    async fn links_for_journals(
        &self,
        ctx: &CallContext,
        journal_ids: &[String],
    ) -> DownstreamResult<Vec<TaskJournalLink>> {
        let request = journal_ids.iter().fold(
            DownstreamRequest::get(ServiceKind::TaskJournalLink, "links_for_journals", "/api/task-journals")
                .with_query("journal_ids", journal_ids.join(",")),
            |request, id| request.with_identity(id.as_str()),
        );
        self.inner.call(request, ctx).await
    }
}
