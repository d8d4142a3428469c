//! Scenario, output and settings builders.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use infraprobe_core::types::{ObservedState, OutputSet, Params, ProviderKind};
use infraprobe_fetcher::ProviderTarget;
use infraprobe_runner::{Check, Mode, Orchestrator, RunSettings, Scenario};
use serde_json::json;

use super::mock_engine::MockEngine;
use super::mock_fetcher::MockFactory;

pub const TARGET_GROUP_ARN: &str =
    "arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/web/6d0ecf831eec9f09";

/// Outputs of an ALB module: target group ARN, declared health check and
/// attachment counts.
pub fn alb_outputs() -> OutputSet {
    [
        ("target_group_arn", json!(TARGET_GROUP_ARN)),
        (
            "health_check",
            json!({
                "path": "/health",
                "protocol": "HTTP",
                "interval": "30",
                "timeout": "5",
                "healthy_threshold": "3",
                "unhealthy_threshold": "3",
                "matcher": "200"
            }),
        ),
        ("target_counts", json!({"ip": "1", "instances": "2"})),
        ("region", json!("us-east-1")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v))
    .collect()
}

/// The target group as the provider reports it when it matches [`alb_outputs`].
pub fn matching_target_group() -> ObservedState {
    ObservedState::new()
        .with("name", "web")
        .with("path", "/health")
        .with("protocol", "HTTP")
        .with("interval", 30)
        .with("timeout", 5)
        .with("healthy_threshold", 3)
        .with("unhealthy_threshold", 3)
        .with("matcher", "200")
        .with("port", 8080)
}

pub fn health_check() -> Check {
    Check::HealthCheck {
        resource_output: "target_group_arn".to_owned(),
        expected_output: "health_check".to_owned(),
    }
}

pub fn attachment_count() -> Check {
    Check::AttachmentCount {
        resource_output: "target_group_arn".to_owned(),
        count_output: "target_counts".to_owned(),
        count_keys: vec!["ip".to_owned(), "instances".to_owned()],
    }
}

pub fn scenario(name: &str, checks: Vec<Check>) -> Scenario {
    Scenario {
        name: name.to_owned(),
        module: PathBuf::from("modules/alb"),
        mode: Mode::Apply,
        provider: ProviderTarget::new(ProviderKind::Aws),
        vars: Params::new(),
        var_files: Vec::new(),
        checks,
    }
}

pub fn plan_scenario(name: &str) -> Scenario {
    Scenario {
        mode: Mode::Plan,
        ..scenario(name, Vec::new())
    }
}

/// No settle delay, a single observation per check, generous scenario timeout.
pub fn settings(state_root: &Path) -> RunSettings {
    RunSettings {
        state_root: state_root.to_path_buf(),
        run_init: true,
        settle_delay: Duration::ZERO,
        convergence_timeout: Duration::ZERO,
        poll_interval: Duration::from_millis(10),
        scenario_timeout: Duration::from_secs(10),
        max_parallel: 4,
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator<MockEngine, MockFactory>,
    pub engine: Arc<MockEngine>,
    pub factory: Arc<MockFactory>,
    _dir: tempfile::TempDir,
}

pub fn harness(engine: MockEngine, factory: MockFactory) -> Harness {
    harness_with(engine, factory, |_| {})
}

pub fn harness_with(
    engine: MockEngine,
    factory: MockFactory,
    tune: impl FnOnce(&mut RunSettings),
) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut settings = settings(dir.path());
    tune(&mut settings);

    let engine = Arc::new(engine);
    let factory = Arc::new(factory);
    Harness {
        orchestrator: Orchestrator::new(Arc::clone(&engine), Arc::clone(&factory), settings),
        engine,
        factory,
        _dir: dir,
    }
}
