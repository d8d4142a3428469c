//! Timeouts and cancellation never skip teardown.

use std::sync::atomic::Ordering;
use std::time::Duration;

use infraprobe_runner::StepOutcome;
use tokio_util::sync::CancellationToken;

use crate::helpers::builders::*;
use crate::helpers::mock_engine::MockEngine;
use crate::helpers::mock_fetcher::{FetcherScript, MockFactory};

fn hanging_fetcher() -> MockFactory {
    MockFactory::new(FetcherScript {
        hang: true,
        ..FetcherScript::default()
    })
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}

#[tokio::test]
async fn test_e2e_timeout_during_assertion_destroys_once() {
    let h = harness_with(MockEngine::with_outputs(alb_outputs()), hanging_fetcher(), |s| {
        s.scenario_timeout = Duration::from_millis(200)
    });

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![health_check()]), &CancellationToken::new())
        .await;

    assert!(result.timed_out);
    assert!(!result.passed());
    assert_eq!(result.provision, Some(StepOutcome::Ok));
    assert_eq!(result.destroy, Some(StepOutcome::Ok));
    assert_eq!(h.engine.calls.destroys(), 1);
}

#[tokio::test]
async fn test_e2e_timeout_during_apply_destroys_partial_environment() {
    let h = harness_with(
        MockEngine::with_outputs(alb_outputs()).apply_delay(Duration::from_secs(3600)),
        hanging_fetcher(),
        |s| s.scenario_timeout = Duration::from_millis(100),
    );

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![health_check()]), &CancellationToken::new())
        .await;

    assert!(result.timed_out);
    assert!(result.provision.is_none(), "apply never finished");
    assert_eq!(result.destroy, Some(StepOutcome::Ok));
    assert_eq!(h.engine.calls.destroys(), 1);
}

#[tokio::test]
async fn test_e2e_cancel_token_tears_down() {
    let h = harness(MockEngine::with_outputs(alb_outputs()), hanging_fetcher());
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        let calls = std::sync::Arc::clone(&h.factory.calls);
        tokio::spawn(async move {
            wait_until(|| calls.calls() > 0).await;
            cancel.cancel();
        })
    };

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![health_check()]), &cancel)
        .await;
    canceller.await.unwrap();

    assert!(result.cancelled);
    assert!(!result.passed());
    assert_eq!(result.destroy, Some(StepOutcome::Ok));
    assert_eq!(h.engine.calls.destroys(), 1);
}

#[tokio::test]
async fn test_e2e_dropped_scenario_future_schedules_destroy() {
    let h = harness(MockEngine::with_outputs(alb_outputs()), hanging_fetcher());

    let task = {
        let orchestrator = h.orchestrator.clone();
        let s = scenario("alb", vec![health_check()]);
        tokio::spawn(async move { orchestrator.run_scenario(&s, &CancellationToken::new()).await })
    };

    let calls = std::sync::Arc::clone(&h.factory.calls);
    wait_until(|| calls.calls() > 0).await;
    assert_eq!(h.engine.calls.destroys(), 0);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    let engine = std::sync::Arc::clone(&h.engine);
    wait_until(|| engine.calls.destroys.load(Ordering::SeqCst) == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.engine.calls.destroys(), 1, "drop schedules exactly one destroy");
}
