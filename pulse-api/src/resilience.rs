//! Bounded retry around a single downstream call.
//!
//! Only transient outcomes (`Transport`, `TimedOut`) are retried, and only
//! for requests that are safe to repeat. Backoff doubles per retry with
//! jitter drawn from `[0, base)`. Cancellation stops retrying at the next
//! boundary.

use std::future::Future;

use pulse_core::{Cancellation, DownstreamRequest, DownstreamResult, RetryPolicy};

use crate::telemetry::metrics::with_metrics;

/// Retry wrapper shared by every downstream client.
#[derive(Debug, Clone, Default)]
pub struct Resilience {
    policy: RetryPolicy,
}

impl Resilience {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `attempt` until it yields a non-transient result, the attempt
    /// budget runs out, or `cancel` fires. `attempt` receives the 1-based
    /// attempt number.
    ///
    /// Returns the last result. Cancellation during backoff yields
    /// `TimedOut`.
    pub async fn execute<T, F, Fut>(
        &self,
        request: &DownstreamRequest,
        cancel: &Cancellation,
        mut attempt: F,
    ) -> DownstreamResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = DownstreamResult<T>>,
    {
        let budget = self.policy.attempts_for(request.is_retry_safe());
        let mut number = 1;

        loop {
            let result = attempt(number).await;
            if !result.is_transient() || number >= budget {
                return result;
            }

            let delay = self.policy.delay_for(number - 1);
            tracing::debug!(
                service = %request.service(),
                operation = request.operation(),
                attempt = number,
                outcome = result.outcome_label(),
                delay_ms = delay.as_millis() as u64,
                "Retrying downstream call"
            );
            with_metrics(|m| m.record_retry(request.service().as_str(), request.operation()));

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    tracing::debug!(
                        service = %request.service(),
                        operation = request.operation(),
                        attempt = number,
                        "Retry abandoned: request cancelled"
                    );
                    return DownstreamResult::TimedOut;
                }
            }
            number += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::{FailureKind, ServiceKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn read() -> DownstreamRequest {
        DownstreamRequest::get(ServiceKind::Task, "tasks_for_user", "/api/tasks/user/x")
    }

    fn policy() -> Resilience {
        Resilience::new(RetryPolicy::new(3, Duration::from_millis(100)).with_jitter(false))
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_recovers() {
        let calls = AtomicU32::new(0);
        let result = policy()
            .execute(&read(), &Cancellation::never(), |n| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        DownstreamResult::transport("503 Service Unavailable")
                    } else {
                        DownstreamResult::Success(n)
                    }
                }
            })
            .await;

        assert_eq!(result, DownstreamResult::Success(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_failure_is_not_retried() {
        for failure in [
            DownstreamResult::<u8>::invalid_input("bad id"),
            DownstreamResult::decode("unexpected token"),
        ] {
            let calls = AtomicU32::new(0);
            let result = policy()
                .execute(&read(), &Cancellation::never(), |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let failure = failure.clone();
                    async move { failure }
                })
                .await;
            assert_eq!(result, failure);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_last_result_when_exhausted() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result: DownstreamResult<u8> = policy()
            .execute(&read(), &Cancellation::never(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { DownstreamResult::TimedOut }
            })
            .await;

        assert_eq!(result, DownstreamResult::TimedOut);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms of backoff
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unkeyed_write_gets_one_attempt() {
        let write = DownstreamRequest::post(
            ServiceKind::Task,
            "create_task",
            "/api/tasks",
            serde_json::json!({ "title": "x" }),
        );
        let calls = AtomicU32::new(0);
        let result: DownstreamResult<u8> = policy()
            .execute(&write, &Cancellation::never(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { DownstreamResult::transport("connection reset") }
            })
            .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Transport));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let keyed = write.with_idempotency_key("create-1");
        let calls = AtomicU32::new(0);
        let _: DownstreamResult<u8> = policy()
            .execute(&keyed, &Cancellation::never(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { DownstreamResult::transport("connection reset") }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_retries() {
        let cancel = Cancellation::never().with_timeout(Duration::from_millis(150));
        let calls = AtomicU32::new(0);
        let result: DownstreamResult<u8> = policy()
            .execute(&read(), &cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { DownstreamResult::transport("refused") }
            })
            .await;

        // first backoff (100ms) completes, second (200ms) is cut short
        assert_eq!(result, DownstreamResult::TimedOut);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
