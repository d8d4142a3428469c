//! Plan-only scenarios never create or destroy anything.

use infraprobe_runner::{Mode, ScenarioFile, StepOutcome};
use tokio_util::sync::CancellationToken;

use crate::helpers::builders::*;
use crate::helpers::mock_engine::MockEngine;
use crate::helpers::mock_fetcher::MockFactory;

#[tokio::test]
async fn test_e2e_plan_only_never_applies() {
    let h = harness(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::observing(matching_target_group()),
    );

    let result = h
        .orchestrator
        .run_scenario(&plan_scenario("alb-plan"), &CancellationToken::new())
        .await;

    assert!(result.passed(), "{result:?}");
    assert_eq!(result.mode, Mode::Plan);
    assert_eq!(result.plan.map(|p| p.to_add), Some(3));
    assert_eq!(result.provision, Some(StepOutcome::Ok));
    assert!(result.destroy.is_none());
    assert_eq!(h.engine.calls.applies(), 0);
    assert_eq!(h.engine.calls.destroys(), 0);
    assert_eq!(h.factory.calls.created(), 0);
}

#[tokio::test]
async fn test_e2e_scenario_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenarios.toml");
    tokio::fs::write(
        &path,
        r#"
        [[scenario]]
        name = "alb-plan"
        module = "modules/alb"
        mode = "plan"
        provider = { kind = "aws" }

        [[scenario]]
        name = "alb-health-check"
        module = "modules/alb"
        provider = { kind = "aws", region_output = "region" }

        [[scenario.check]]
        kind = "health_check"
        resource_output = "target_group_arn"
        expected_output = "health_check"
        "#,
    )
    .await
    .unwrap();

    let file = ScenarioFile::load(&path).await.unwrap();
    let h = harness(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::observing(matching_target_group()),
    );
    let summary = h
        .orchestrator
        .run_all(file.scenarios, &CancellationToken::new())
        .await;

    assert!(summary.passed(), "{summary:?}");
    assert_eq!(summary.results[0].name, "alb-plan");
    assert_eq!(summary.results[1].name, "alb-health-check");
    assert_eq!(h.engine.calls.applies(), 1);
    assert_eq!(h.engine.calls.destroys(), 1);
}
