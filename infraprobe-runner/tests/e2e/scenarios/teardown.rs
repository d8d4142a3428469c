//! Destroy runs exactly once for every applied environment, whatever
//! happened between apply and teardown.

use infraprobe_core::error::{FetchError, ProvisionCause};
use infraprobe_core::types::{AttributeValue, OutputSet};
use infraprobe_runner::{CheckStatus, StepOutcome};
use tokio_util::sync::CancellationToken;

use crate::helpers::builders::*;
use crate::helpers::mock_engine::MockEngine;
use crate::helpers::mock_fetcher::{FetcherScript, MockFactory};

fn assert_destroyed_once(h: &Harness) {
    assert_eq!(h.engine.calls.destroys(), 1, "destroy must run exactly once");
    let by_env = h.engine.calls.destroys_by_env();
    assert_eq!(by_env.len(), 1);
    assert!(by_env.values().all(|&n| n == 1));
}

#[tokio::test]
async fn test_e2e_passing_scenario_is_torn_down() {
    let h = harness(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::observing(matching_target_group()),
    );

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![health_check()]), &CancellationToken::new())
        .await;

    assert!(result.passed(), "{result:?}");
    assert_eq!(result.provision, Some(StepOutcome::Ok));
    assert_eq!(result.destroy, Some(StepOutcome::Ok));
    assert_eq!(result.checks.len(), 1);
    assert_destroyed_once(&h);
}

#[tokio::test]
async fn test_e2e_assertion_failure_still_destroys() {
    let h = harness(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::observing(matching_target_group().with("interval", 60)),
    );

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![health_check()]), &CancellationToken::new())
        .await;

    assert!(!result.passed());
    assert_eq!(result.provision, Some(StepOutcome::Ok));
    match &result.checks[0].status {
        CheckStatus::Failed { mismatches } => {
            assert_eq!(mismatches.len(), 1, "only interval differs");
            let m = &mismatches.entries()[0];
            assert_eq!(m.attribute, "interval");
            assert_eq!(m.expected, AttributeValue::Int(30));
            assert_eq!(m.observed, Some(AttributeValue::Int(60)));
        }
        other => panic!("expected a mismatch report, got {other:?}"),
    }
    assert_destroyed_once(&h);
}

#[tokio::test]
async fn test_e2e_permanent_fetch_error_still_destroys() {
    let h = harness(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::new(FetcherScript {
            error: Some(FetchError::Permanent("AccessDenied".to_owned())),
            ..FetcherScript::default()
        }),
    );

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![health_check()]), &CancellationToken::new())
        .await;

    assert!(!result.passed());
    assert!(
        matches!(&result.checks[0].status, CheckStatus::Error { message } if message.contains("AccessDenied"))
    );
    assert_eq!(h.factory.calls.calls(), 1, "permanent errors are not retried");
    assert_destroyed_once(&h);
}

#[tokio::test]
async fn test_e2e_apply_conflict_skips_checks_and_destroys() {
    let h = harness(
        MockEngine::with_outputs(alb_outputs()).apply_failure(ProvisionCause::Conflict),
        MockFactory::observing(matching_target_group()),
    );

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![health_check()]), &CancellationToken::new())
        .await;

    assert!(!result.passed());
    assert!(matches!(
        result.provision,
        Some(StepOutcome::Failed {
            cause: Some(ProvisionCause::Conflict),
            ..
        })
    ));
    assert!(result.checks.is_empty(), "no checks after a failed apply");
    assert_eq!(result.mismatches(), 0);
    assert_eq!(result.destroy, Some(StepOutcome::Ok), "destroy outcome is recorded");
    assert_eq!(h.factory.calls.created(), 0, "no fetcher for a failed apply");
    assert_destroyed_once(&h);
}

#[tokio::test]
async fn test_e2e_destroy_failure_fails_scenario() {
    let h = harness(
        MockEngine::with_outputs(alb_outputs()).destroy_fails(),
        MockFactory::observing(matching_target_group()),
    );

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![health_check()]), &CancellationToken::new())
        .await;

    assert!(result.checks.iter().all(|c| c.passed()), "checks passed");
    assert!(!result.passed(), "destroy failure must fail the scenario");
    assert!(matches!(result.destroy, Some(StepOutcome::Failed { .. })));
    assert_destroyed_once(&h);
}

#[tokio::test]
async fn test_e2e_bad_output_is_check_error_not_abort() {
    let base = alb_outputs();
    let outputs: OutputSet = base
        .names()
        .map(|name| {
            let value = if name == "target_counts" {
                serde_json::json!({"ip": "one", "instances": "2"})
            } else {
                base.get(name).cloned().unwrap_or_default()
            };
            (name.to_owned(), value)
        })
        .collect();

    let h = harness(
        MockEngine::with_outputs(outputs),
        MockFactory::new(FetcherScript {
            observed: vec![matching_target_group()],
            attachments: vec!["i-1".into(), "i-2".into(), "10.0.0.9".into()],
            ..FetcherScript::default()
        }),
    );

    let result = h
        .orchestrator
        .run_scenario(
            &scenario("alb", vec![attachment_count(), health_check()]),
            &CancellationToken::new(),
        )
        .await;

    assert!(
        matches!(&result.checks[0].status, CheckStatus::Error { message } if message.contains("cannot parse"))
    );
    assert!(result.checks[1].passed(), "later checks still run");
    assert_destroyed_once(&h);
}

#[tokio::test]
async fn test_e2e_lifecycle_only_scenario() {
    let h = harness(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::observing(matching_target_group()),
    );

    let result = h
        .orchestrator
        .run_scenario(&scenario("attach-detach", Vec::new()), &CancellationToken::new())
        .await;

    assert!(result.passed());
    assert_eq!(h.factory.calls.created(), 0, "no checks, no provider client");
    assert_destroyed_once(&h);
}
