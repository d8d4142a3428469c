//! E2E test scenarios, grouped by lifecycle concern.

mod assertions;
mod cancellation;
mod parallel;
mod plan;
mod retry;
mod teardown;
