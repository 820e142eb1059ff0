//! Downstream service clients.
//!
//! Each entity service is reached through a trait (`UserService`,
//! `TaskService`, ...) so the aggregator can be exercised against scripted
//! fakes. The HTTP implementations share [`ServiceClient`], which validates
//! the request, forwards the caller's credential, applies the retry policy,
//! and turns every outcome into a [`DownstreamResult`].

pub mod journal;
pub mod link;
pub mod mood;
pub mod task;
pub mod user;

use std::sync::Arc;
use std::time::{Duration, Instant};

use pulse_core::{
    Cancellation, Credential, DownstreamRequest, DownstreamResult, FailureKind, RequestMethod,
};
use serde::de::DeserializeOwned;

use crate::config::OrchestratorConfig;
use crate::constants::IDEMPOTENCY_KEY_HEADER;
use crate::credential;
use crate::resilience::Resilience;
use crate::telemetry::metrics::with_metrics;

pub use journal::{HttpJournalService, JournalService};
pub use link::{HttpLinkService, LinkService};
pub use mood::{HttpMoodService, MoodService};
pub use task::{HttpTaskService, TaskService};
pub use user::{HttpUserService, UserService};

/// Longest downstream error body echoed into a failure detail.
const MAX_ERROR_DETAIL: usize = 256;

// ============================================================================
// CALL CONTEXT
// ============================================================================

/// Per-request state handed to every downstream call: the forwarded
/// credential and the request's cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    credential: Option<Credential>,
    cancel: Cancellation,
}

impl CallContext {
    pub fn new(credential: Option<Credential>, cancel: Cancellation) -> Self {
        Self { credential, cancel }
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn cancel(&self) -> &Cancellation {
        &self.cancel
    }
}

// ============================================================================
// HTTP TRANSPORT
// ============================================================================

/// One downstream base URL reached over HTTP.
#[derive(Clone)]
pub struct HttpServiceClient {
    client: reqwest::Client,
    base_url: String,
    call_timeout: Duration,
}

impl HttpServiceClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            call_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform one attempt of `request`, emitting one structured event and
    /// one metric sample for it.
    pub async fn send<T: DeserializeOwned>(
        &self,
        request: &DownstreamRequest,
        cancel: &Cancellation,
        attempt: u32,
    ) -> DownstreamResult<T> {
        let start = Instant::now();
        let result = self.exchange(request, cancel).await;
        let latency = start.elapsed();

        match result.failure_message() {
            None => tracing::info!(
                service = %request.service(),
                operation = request.operation(),
                outcome = result.outcome_label(),
                latency_ms = latency.as_millis() as u64,
                attempt,
                "Downstream call completed"
            ),
            Some(detail) => tracing::warn!(
                service = %request.service(),
                operation = request.operation(),
                outcome = result.outcome_label(),
                latency_ms = latency.as_millis() as u64,
                attempt,
                detail,
                "Downstream call failed"
            ),
        }
        with_metrics(|m| {
            m.record_downstream_call(
                request.service().as_str(),
                request.operation(),
                result.outcome_label(),
                latency.as_secs_f64(),
            )
        });

        result
    }

    async fn exchange<T: DeserializeOwned>(
        &self,
        request: &DownstreamRequest,
        cancel: &Cancellation,
    ) -> DownstreamResult<T> {
        if let Err((kind, message)) = request.validate() {
            return DownstreamResult::failure(kind, message);
        }
        if cancel.is_cancelled() {
            return DownstreamResult::TimedOut;
        }

        let url = format!("{}{}", self.base_url, request.path());
        let mut builder = match request.method() {
            RequestMethod::Get => self.client.get(&url),
            RequestMethod::Post => self.client.post(&url),
        };
        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }
        if let Some(key) = request.idempotency_key() {
            builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        let builder = credential::apply(builder, request).timeout(self.call_timeout);

        let call = async move {
            let response = builder.send().await.map_err(classify)?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err((
                    FailureKind::Transport,
                    format!("{} returned {}{}", url, status, error_detail(&body)),
                ));
            }
            let bytes = response.bytes().await.map_err(classify)?;
            serde_json::from_slice::<T>(&bytes).map_err(|e| {
                (
                    FailureKind::Decode,
                    format!("Failed to decode {} response: {}", request.operation(), e),
                )
            })
        };

        tokio::select! {
            outcome = call => match outcome {
                Ok(value) => DownstreamResult::Success(value),
                Err((kind, message)) => DownstreamResult::failure(kind, message),
            },
            _ = cancel.cancelled() => DownstreamResult::TimedOut,
        }
    }
}

impl std::fmt::Debug for HttpServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServiceClient")
            .field("base_url", &self.base_url)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

fn classify(err: reqwest::Error) -> (FailureKind, String) {
    if err.is_timeout() {
        (FailureKind::TimedOut, format!("Request timed out: {}", err))
    } else {
        (FailureKind::Transport, format!("Request failed: {}", err))
    }
}

fn error_detail(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return String::new();
    }
    let cut = body
        .char_indices()
        .nth(MAX_ERROR_DETAIL)
        .map(|(idx, _)| idx)
        .unwrap_or(body.len());
    format!(": {}", &body[..cut])
}

// ============================================================================
// SERVICE CLIENT
// ============================================================================

/// HTTP transport plus the shared retry policy.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: HttpServiceClient,
    resilience: Arc<Resilience>,
}

impl ServiceClient {
    pub fn new(http: HttpServiceClient, resilience: Arc<Resilience>) -> Self {
        Self { http, resilience }
    }

    /// Forward the caller's credential and run `request` under the retry
    /// policy.
    pub async fn call<T: DeserializeOwned + Send>(
        &self,
        request: DownstreamRequest,
        ctx: &CallContext,
    ) -> DownstreamResult<T> {
        let request = credential::forward(request, ctx.credential());
        let request = &request;
        let cancel = ctx.cancel();
        let http = &self.http;
        self.resilience
            .execute(request, cancel, move |attempt| http.send(request, cancel, attempt))
            .await
    }
}

// ============================================================================
// WIRING
// ============================================================================

/// Every downstream dependency of the aggregator.
#[derive(Clone)]
pub struct Downstreams {
    pub users: Arc<dyn UserService>,
    pub tasks: Arc<dyn TaskService>,
    pub moods: Arc<dyn MoodService>,
    pub journals: Arc<dyn JournalService>,
    pub links: Arc<dyn LinkService>,
}

impl Downstreams {
    /// HTTP clients for every service in `config`, sharing one connection
    /// pool and one retry policy.
    pub fn http(config: &OrchestratorConfig, client: reqwest::Client) -> Self {
        let resilience = Arc::new(Resilience::new(config.retry.clone()));
        let service = |base_url: &str| {
            ServiceClient::new(
                HttpServiceClient::new(client.clone(), base_url, config.call_timeout),
                Arc::clone(&resilience),
            )
        };

        Self {
            users: Arc::new(HttpUserService::new(service(&config.services.user))),
            tasks: Arc::new(HttpTaskService::new(service(&config.services.task))),
            moods: Arc::new(HttpMoodService::new(service(&config.services.mood))),
            journals: Arc::new(HttpJournalService::new(service(&config.services.journal))),
            links: Arc::new(HttpLinkService::new(service(&config.services.link))),
        }
    }
}
