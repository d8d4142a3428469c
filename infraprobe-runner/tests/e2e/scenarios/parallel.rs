//! Parallel scenarios are isolated and bounded by `max_parallel`.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::time::Duration;

use infraprobe_core::error::ProvisionCause;
use infraprobe_runner::StepOutcome;
use tokio_util::sync::CancellationToken;

use crate::helpers::builders::*;
use crate::helpers::mock_engine::MockEngine;
use crate::helpers::mock_fetcher::MockFactory;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_e2e_parallel_scenarios_are_isolated() {
    let h = harness_with(
        MockEngine::with_outputs(alb_outputs()).apply_delay(Duration::from_millis(50)),
        MockFactory::observing(matching_target_group()),
        |s| s.max_parallel = 2,
    );
    let scenarios: Vec<_> = (0..6)
        .map(|i| scenario(&format!("alb-{i}"), vec![health_check()]))
        .collect();

    let summary = h
        .orchestrator
        .run_all(scenarios, &CancellationToken::new())
        .await;

    assert!(summary.passed(), "{summary:?}");
    let names: Vec<_> = summary.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["alb-0", "alb-1", "alb-2", "alb-3", "alb-4", "alb-5"]);

    let env_ids: HashSet<_> = summary.results.iter().map(|r| r.env_id.clone()).collect();
    assert_eq!(env_ids.len(), 6, "every scenario gets its own environment");

    let workspaces: HashSet<_> = h.engine.calls.workspaces().into_iter().collect();
    assert_eq!(workspaces.len(), 6, "no shared engine state");

    let by_env = h.engine.calls.destroys_by_env();
    assert_eq!(by_env.len(), 6);
    assert!(by_env.values().all(|&n| n == 1));

    assert!(h.engine.calls.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert_eq!(h.factory.calls.created(), 6, "one fetcher per scenario");
}

#[tokio::test]
async fn test_e2e_one_failure_does_not_affect_others() {
    let failing = harness(
        MockEngine::with_outputs(alb_outputs()).apply_failure(ProvisionCause::Quota),
        MockFactory::observing(matching_target_group()),
    );
    let result = failing
        .orchestrator
        .run_scenario(&scenario("quota", vec![health_check()]), &CancellationToken::new())
        .await;
    assert!(matches!(
        result.provision,
        Some(StepOutcome::Failed {
            cause: Some(ProvisionCause::Quota),
            ..
        })
    ));

    let h = harness(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::observing(matching_target_group().with("matcher", "200-299")),
    );
    let summary = h
        .orchestrator
        .run_all(
            vec![
                scenario("mismatch", vec![health_check()]),
                scenario("lifecycle", Vec::new()),
            ],
            &CancellationToken::new(),
        )
        .await;

    assert!(!summary.passed());
    assert_eq!(summary.failed_count(), 1);
    assert!(!summary.results[0].passed());
    assert!(summary.results[1].passed());
    assert_eq!(h.engine.calls.destroys(), 2);
}

#[tokio::test]
async fn test_e2e_cancelled_run_skips_pending_scenarios() {
    let h = harness(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::observing(matching_target_group()),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = h
        .orchestrator
        .run_all(
            vec![scenario("a", vec![health_check()]), scenario("b", Vec::new())],
            &cancel,
        )
        .await;

    assert_eq!(summary.results.len(), 2);
    assert!(summary.results.iter().all(|r| r.cancelled && !r.passed()));
    assert_eq!(h.engine.calls.applies(), 0);
    assert_eq!(h.engine.calls.destroys(), 0);
}
