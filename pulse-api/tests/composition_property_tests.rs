//! Property-Based Tests for Dashboard Composition
//!
//! **Property 1: Role Call Sets**
//!
//! For any role, a dashboard composed against healthy downstream services
//! SHALL carry exactly the sections `Role::dashboard_sections` names, each
//! one fulfilled.
//!
//! **Property 2: Failures Never Fulfil**
//!
//! For any failed section call, the resulting section SHALL be degraded with
//! the call's failure kind, AND its data SHALL be empty.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use pulse_api::Orchestrator;
use pulse_core::{
    Cancellation, Credential, DownstreamResult, FailureKind, ResourceKind, Section, SectionStatus,
};
use pulse_test_utils::generators::{arb_failed_result, arb_role};
use pulse_test_utils::{fixtures, FakeDownstreams, FakeIdentityResolver};
use uuid::Uuid;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("Failed to build runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_role_gets_exactly_its_sections(role in arb_role()) {
        let user_id = Uuid::now_v7();
        let fakes = FakeDownstreams::healthy(user_id);
        let resolver = FakeIdentityResolver::resolving(fixtures::identity(user_id, role));
        let orchestrator = Orchestrator::builder()
            .downstreams(fakes.downstreams())
            .identity_resolver(Arc::new(resolver))
            .build()
            .expect("orchestrator builds");

        let view = runtime()
            .block_on(orchestrator.compose_dashboard(
                Credential::from_header("abc123"),
                Cancellation::never(),
            ))
            .expect("identity resolves");

        let composed: BTreeSet<ResourceKind> =
            view.sections.statuses().into_iter().map(|(kind, _)| kind).collect();
        let expected: BTreeSet<ResourceKind> = role.dashboard_sections().iter().copied().collect();
        prop_assert_eq!(composed, expected);

        for (kind, status) in view.sections.statuses() {
            prop_assert!(status.is_fulfilled(), "{} not fulfilled: {:?}", kind, status);
        }
        prop_assert!(view.diagnostics.is_empty());
    }

    #[test]
    fn prop_failed_results_are_never_fulfilled(result in arb_failed_result::<Vec<u32>>()) {
        let expected_kind = result.failure_kind();
        let section = Section::from_result(result);

        prop_assert!(!section.is_fulfilled());
        prop_assert!(section.data.is_empty());
        match section.status {
            SectionStatus::Degraded { reason, message } => {
                prop_assert_eq!(Some(reason), expected_kind);
                prop_assert!(!message.is_empty());
            }
            SectionStatus::Fulfilled => prop_assert!(false, "failed result fulfilled"),
        }
    }
}

#[test]
fn test_timed_out_section_reads_as_deadline() {
    let section: Section<Vec<u32>> = Section::from_result(DownstreamResult::TimedOut);
    assert_eq!(
        section.status,
        SectionStatus::Degraded {
            reason: FailureKind::TimedOut,
            message: "deadline exceeded".to_string(),
        }
    );
}
