//! End-to-end tests for the scenario orchestrator.
//!
//! A scripted provisioning engine and a scripted provider fetcher stand in
//! for terraform and the cloud APIs, so every lifecycle path (apply failure,
//! mismatch, fetch error, timeout, cancellation) runs without credentials.
//!
//! # Test Structure
//!
//! - `helpers/` -- mock engine, mock fetcher factory, scenario builders
//! - `scenarios/` -- tests grouped by lifecycle concern
//!
//! # Running
//!
//! ```bash
//! cargo test -p infraprobe-runner --test e2e
//! ```

#![recursion_limit = "256"]

mod helpers;
mod scenarios;
