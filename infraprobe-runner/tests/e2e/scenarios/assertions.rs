//! Check evaluation against the provider, including convergence polling.

use std::collections::BTreeMap;
use std::time::Duration;

use infraprobe_core::types::{AttributeValue, OutputKind};
use infraprobe_runner::{Check, CheckStatus};
use tokio_util::sync::CancellationToken;

use crate::helpers::builders::*;
use crate::helpers::mock_engine::MockEngine;
use crate::helpers::mock_fetcher::{FetcherScript, MockFactory};

#[tokio::test]
async fn test_e2e_attachment_count_matches_targets() {
    let h = harness(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::new(FetcherScript {
            attachments: vec!["i-1".into(), "i-2".into(), "10.0.0.9".into()],
            ..FetcherScript::default()
        }),
    );

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![attachment_count()]), &CancellationToken::new())
        .await;
    assert!(result.passed(), "{result:?}");
}

#[tokio::test]
async fn test_e2e_attachment_count_mismatch() {
    let h = harness(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::new(FetcherScript {
            attachments: vec!["i-1".into()],
            ..FetcherScript::default()
        }),
    );

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![attachment_count()]), &CancellationToken::new())
        .await;

    let CheckStatus::Failed { mismatches } = &result.checks[0].status else {
        panic!("expected mismatch, got {:?}", result.checks[0].status);
    };
    let m = &mismatches.entries()[0];
    assert_eq!(m.attribute, "attachments");
    assert_eq!(m.expected, AttributeValue::Int(3));
    assert_eq!(m.observed, Some(AttributeValue::Int(1)));
}

#[tokio::test]
async fn test_e2e_attributes_from_vars() {
    let h = harness(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::observing(matching_target_group()),
    );
    let mut s = scenario(
        "alb",
        vec![Check::Attributes {
            resource_output: "target_group_arn".into(),
            expected: [("name".to_owned(), AttributeValue::from("web"))].into(),
            from_vars: [("port".to_owned(), "app_port".to_owned())].into(),
        }],
    );
    s.vars.insert("app_port".into(), serde_json::json!(8080));

    let result = h.orchestrator.run_scenario(&s, &CancellationToken::new()).await;
    assert!(result.passed(), "{result:?}");
}

#[tokio::test]
async fn test_e2e_output_present_needs_no_provider() {
    let h = harness(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::observing(matching_target_group()),
    );
    let check = Check::OutputPresent {
        outputs: BTreeMap::from([
            ("target_group_arn".to_owned(), OutputKind::String),
            ("health_check".to_owned(), OutputKind::StringMap),
            ("listener_arn".to_owned(), OutputKind::String),
        ]),
    };

    let result = h
        .orchestrator
        .run_scenario(&scenario("outputs", vec![check]), &CancellationToken::new())
        .await;

    let CheckStatus::Failed { mismatches } = &result.checks[0].status else {
        panic!("expected missing output to be reported");
    };
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches.entries()[0].attribute, "listener_arn");
    assert!(mismatches.entries()[0].observed.is_none());
    assert_eq!(h.factory.calls.created(), 0);
    assert_eq!(h.engine.calls.destroys(), 1);
}

#[tokio::test]
async fn test_e2e_converges_after_settling() {
    let h = harness_with(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::new(FetcherScript {
            observed: vec![
                matching_target_group().with("interval", 10),
                matching_target_group().with("interval", 10),
                matching_target_group(),
            ],
            ..FetcherScript::default()
        }),
        |s| s.convergence_timeout = Duration::from_secs(5),
    );

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![health_check()]), &CancellationToken::new())
        .await;

    assert!(result.passed(), "{result:?}");
    assert_eq!(h.factory.calls.calls(), 3, "polled until converged");
}

#[tokio::test]
async fn test_e2e_convergence_window_keeps_last_report() {
    let h = harness_with(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::new(FetcherScript {
            observed: vec![
                matching_target_group().with("interval", 10),
                matching_target_group().with("interval", 60),
            ],
            ..FetcherScript::default()
        }),
        |s| s.convergence_timeout = Duration::from_millis(100),
    );

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![health_check()]), &CancellationToken::new())
        .await;

    let CheckStatus::Failed { mismatches } = &result.checks[0].status else {
        panic!("expected mismatch");
    };
    assert_eq!(mismatches.entries()[0].observed, Some(AttributeValue::Int(60)));
    assert!(h.factory.calls.calls() >= 2);
    assert_eq!(h.engine.calls.destroys(), 1);
}

#[tokio::test]
async fn test_e2e_unbounded_convergence_window_does_not_overflow() {
    let h = harness_with(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::new(FetcherScript {
            observed: vec![
                matching_target_group().with("interval", 10),
                matching_target_group(),
            ],
            ..FetcherScript::default()
        }),
        |s| s.convergence_timeout = Duration::MAX,
    );

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![health_check()]), &CancellationToken::new())
        .await;

    assert!(result.passed(), "{result:?}");
    assert_eq!(h.factory.calls.calls(), 2);
}

#[tokio::test]
async fn test_e2e_unbounded_poll_interval_closes_window() {
    let h = harness_with(
        MockEngine::with_outputs(alb_outputs()),
        MockFactory::observing(matching_target_group().with("interval", 60)),
        |s| {
            s.convergence_timeout = Duration::from_secs(60);
            s.poll_interval = Duration::MAX;
        },
    );

    let result = h
        .orchestrator
        .run_scenario(&scenario("alb", vec![health_check()]), &CancellationToken::new())
        .await;

    assert!(matches!(result.checks[0].status, CheckStatus::Failed { .. }));
    assert_eq!(h.factory.calls.calls(), 1, "no second poll past the window");
    assert_eq!(h.engine.calls.destroys(), 1);
}
