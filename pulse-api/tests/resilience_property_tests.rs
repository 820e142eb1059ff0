//! Property-Based Tests for Retry and Credential Forwarding
//!
//! **Property 1: Bounded Retry**
//!
//! For any retry-safe call that fails transiently N times before succeeding,
//! the wrapper SHALL make exactly min(max_attempts, N + 1) attempts, AND the
//! gaps between attempts SHALL strictly increase.
//!
//! **Property 2: Permanent Failures Are Final**
//!
//! For any call that fails with InvalidInput or Decode, the wrapper SHALL make
//! exactly one attempt and return that failure unchanged.
//!
//! **Property 3: Credential Normalization**
//!
//! For any inbound token, with or without a bearer prefix in any case, the
//! forwarded header SHALL be `Bearer <token>`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use proptest::prelude::*;
use pulse_api::Resilience;
use pulse_core::{
    Cancellation, Credential, DownstreamRequest, DownstreamResult, FailureKind, RetryPolicy,
    ServiceKind,
};
use pulse_test_utils::generators::{arb_inbound_token, arb_permanent_kind, arb_transient_kind};
use tokio::time::Instant;

// ============================================================================
// TEST HARNESS
// ============================================================================

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("Failed to build runtime")
}

fn read_request() -> DownstreamRequest {
    DownstreamRequest::get(ServiceKind::Mood, "moods_for_user", "/api/moods/user/u1")
}

/// Run the wrapper against a scripted sequence of transient failures that
/// ends in success. Returns the final result and the instant of each attempt.
fn run_script(
    policy: RetryPolicy,
    request: DownstreamRequest,
    failures: Vec<FailureKind>,
) -> (DownstreamResult<u32>, Vec<Instant>) {
    let runtime = paused_runtime();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let result = runtime.block_on(async move {
        let resilience = Resilience::new(policy);
        resilience
            .execute(&request, &Cancellation::never(), |number| {
                sink.lock().unwrap().push(Instant::now());
                let outcome = match failures.get(number as usize - 1) {
                    Some(kind) => DownstreamResult::failure(*kind, "scripted"),
                    None => DownstreamResult::Success(number),
                };
                async move { outcome }
            })
            .await
    });

    let instants = seen.lock().unwrap().clone();
    (result, instants)
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_transient_failures_retry_up_to_budget(
        max_attempts in 1u32..6,
        failures in prop::collection::vec(arb_transient_kind(), 0..8),
        base_ms in 1u64..50,
        jitter in any::<bool>(),
    ) {
        let policy = RetryPolicy::new(max_attempts, Duration::from_millis(base_ms))
            .with_jitter(jitter);
        let failure_count = failures.len() as u32;
        let final_failure = failures.get(max_attempts as usize - 1).copied();

        let (result, instants) = run_script(policy, read_request(), failures);

        let expected = max_attempts.min(failure_count + 1);
        prop_assert_eq!(instants.len() as u32, expected);

        if failure_count < max_attempts {
            prop_assert_eq!(result, DownstreamResult::Success(failure_count + 1));
        } else {
            // the result returned is the one from the final attempt
            prop_assert!(result.is_transient());
            prop_assert_eq!(result.failure_kind(), final_failure);
        }

        let gaps: Vec<Duration> = instants.windows(2).map(|w| w[1] - w[0]).collect();
        for (retry, gap) in gaps.iter().enumerate() {
            prop_assert!(*gap >= Duration::from_millis(base_ms << retry));
        }
        for pair in gaps.windows(2) {
            prop_assert!(pair[1] > pair[0], "gaps not increasing: {:?}", gaps);
        }
    }

    #[test]
    fn prop_permanent_failures_are_not_retried(
        kind in arb_permanent_kind(),
        max_attempts in 1u32..6,
    ) {
        let policy = RetryPolicy::new(max_attempts, Duration::from_millis(10));
        let (result, instants) = run_script(policy, read_request(), vec![kind; 8]);

        prop_assert_eq!(instants.len(), 1);
        prop_assert_eq!(result.failure_kind(), Some(kind));
    }

    #[test]
    fn prop_unkeyed_writes_get_one_attempt(
        kind in arb_transient_kind(),
        max_attempts in 1u32..6,
    ) {
        let request = DownstreamRequest::post(
            ServiceKind::Task,
            "create_task",
            "/api/tasks",
            serde_json::json!({ "title": "x" }),
        );
        let policy = RetryPolicy::new(max_attempts, Duration::from_millis(10));
        let (result, instants) = run_script(policy, request, vec![kind; 8]);

        prop_assert_eq!(instants.len(), 1);
        prop_assert_eq!(result.failure_kind(), Some(kind));
    }

    #[test]
    fn prop_keyed_writes_use_full_budget(
        kind in arb_transient_kind(),
        max_attempts in 1u32..6,
    ) {
        let request = DownstreamRequest::post(
            ServiceKind::Task,
            "create_task",
            "/api/tasks",
            serde_json::json!({ "title": "x" }),
        )
        .with_idempotency_key("create-1");
        let policy = RetryPolicy::new(max_attempts, Duration::from_millis(10));
        let (_, instants) = run_script(policy, request, vec![kind; 8]);

        prop_assert_eq!(instants.len() as u32, max_attempts);
    }

    #[test]
    fn prop_inbound_tokens_forward_as_bearer((token, raw) in arb_inbound_token()) {
        // a bare scheme word is not a token
        prop_assume!(!token.eq_ignore_ascii_case("bearer"));
        let credential = Credential::from_header(&raw).expect("token is non-empty");
        let expected = format!("Bearer {}", token);
        prop_assert_eq!(credential.header_value(), expected.as_str());
        prop_assert_eq!(credential.bearer_token(), Some(token.as_str()));

        let request = read_request().with_credential(Some(credential.clone()));
        prop_assert_eq!(request.credential(), Some(&credential));
    }
}

#[test]
fn test_cancellation_during_backoff_is_timed_out() {
    let runtime = paused_runtime();
    let attempts = runtime.block_on(async {
        let resilience = Resilience::new(
            RetryPolicy::new(5, Duration::from_secs(10)).with_jitter(false),
        );
        let (handle, cancel) = Cancellation::new();
        let request = read_request();
        let mut attempts = 0u32;

        let run = resilience.execute(&request, &cancel, |_| {
            attempts += 1;
            async { DownstreamResult::<u32>::transport("connection refused") }
        });
        let trigger = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.cancel();
        };

        let (result, ()) = tokio::join!(run, trigger);
        assert_eq!(result, DownstreamResult::TimedOut);
        attempts
    });
    assert_eq!(attempts, 1);
}
