//! Transient provider errors are invisible to the scenario until retries
//! run out.

use infraprobe_runner::CheckStatus;
use tokio_util::sync::CancellationToken;

use crate::helpers::builders::*;
use crate::helpers::mock_engine::MockEngine;
use crate::helpers::mock_fetcher::{FetcherScript, MockFactory};

fn flaky(transient_failures: u32) -> MockFactory {
    MockFactory::new(FetcherScript {
        observed: vec![matching_target_group()],
        transient_failures,
        ..FetcherScript::default()
    })
}

#[tokio::test]
async fn test_e2e_transient_failures_below_limit_are_transparent() {
    // fast_policy allows 5 attempts
    for k in 0..5 {
        let h = harness(MockEngine::with_outputs(alb_outputs()), flaky(k));
        let result = h
            .orchestrator
            .run_scenario(&scenario("alb", vec![health_check()]), &CancellationToken::new())
            .await;

        assert!(result.passed(), "k={k}: {result:?}");
        assert_eq!(h.factory.calls.calls(), k as usize + 1, "k={k}");
    }
}

#[tokio::test]
async fn test_e2e_exhausted_retries_surface_last_error() {
    let h = harness(MockEngine::with_outputs(alb_outputs()), flaky(5));
    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![health_check()]), &CancellationToken::new())
        .await;

    assert!(!result.passed());
    assert!(
        matches!(&result.checks[0].status, CheckStatus::Error { message } if message.contains("Throttling"))
    );
    assert_eq!(h.factory.calls.calls(), 5);
    assert_eq!(h.engine.calls.destroys(), 1);
}
