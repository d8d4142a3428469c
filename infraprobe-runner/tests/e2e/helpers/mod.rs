//! Shared E2E test helpers.

pub mod builders;
pub mod mock_engine;
pub mod mock_fetcher;
