//! Metric names and descriptions.
//!
//! Components record through the `metrics` macros using these constants.
//! No exporter is installed by infraprobe itself; an embedding process may
//! install any `metrics` recorder and call [`describe_all`].
//!
//! # Naming
//!
//! - prefix: `infraprobe_`
//! - suffix: `_total` (counter), `_seconds` (histogram)
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(infraprobe_core::metrics::FETCH_RETRIES_TOTAL).increment(1);
//! ```

// ─── label keys ────────────────────────────────────────────────────

/// Provider label key (aws, azure, gcp)
pub const LABEL_PROVIDER: &str = "provider";

/// Result label key (pass, fail)
pub const LABEL_RESULT: &str = "result";

/// Operation label key (plan, apply, destroy)
pub const LABEL_OPERATION: &str = "operation";

// ─── scenarios ─────────────────────────────────────────────────────

/// Scenarios finished (counter, label: result)
pub const SCENARIOS_TOTAL: &str = "infraprobe_scenarios_total";

/// Wall time per scenario including teardown (histogram, seconds)
pub const SCENARIO_DURATION_SECONDS: &str = "infraprobe_scenario_duration_seconds";

// ─── provisioning ──────────────────────────────────────────────────

/// Engine operations that failed (counter, label: operation)
pub const PROVISION_FAILURES_TOTAL: &str = "infraprobe_provision_failures_total";

/// Teardowns scheduled from `Drop` because the scenario was cancelled (counter)
pub const DEFERRED_TEARDOWNS_TOTAL: &str = "infraprobe_deferred_teardowns_total";

// ─── fetchers ──────────────────────────────────────────────────────

/// Provider queries retried after a transient error (counter, label: provider)
pub const FETCH_RETRIES_TOTAL: &str = "infraprobe_fetch_retries_total";

/// Mismatches reported across all checks (counter)
pub const MISMATCHES_TOTAL: &str = "infraprobe_mismatches_total";

/// Registers descriptions for every metric.
///
/// Call once after installing a recorder.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(SCENARIOS_TOTAL, "Scenarios finished, by result");
    describe_histogram!(
        SCENARIO_DURATION_SECONDS,
        "Scenario wall time including teardown, in seconds"
    );
    describe_counter!(
        PROVISION_FAILURES_TOTAL,
        "Provisioning engine operations that failed, by operation"
    );
    describe_counter!(
        DEFERRED_TEARDOWNS_TOTAL,
        "Teardowns scheduled on drop after a scenario was cancelled"
    );
    describe_counter!(
        FETCH_RETRIES_TOTAL,
        "Provider queries retried after a transient error, by provider"
    );
    describe_counter!(MISMATCHES_TOTAL, "Attribute mismatches reported by checks");
}
