//! Provider state fetchers for infraprobe.
//!
//! - [`fetcher`]: the [`StateFetcher`] contract, [`ProviderTarget`], [`FetcherFactory`]
//! - [`retry`]: [`RetryingFetcher`] with exponential backoff
//! - [`aws`], [`azure`], [`gcp`]: one fetcher per provider
//! - [`provider`]: [`ProviderFetcher`] and the production [`CloudFetcherFactory`]

pub mod aws;
pub mod azure;
pub mod fetcher;
pub mod gcp;
mod http;
pub mod provider;
pub mod retry;
pub mod token;

pub use fetcher::{FetcherFactory, ProviderTarget, StateFetcher};
pub use provider::{CloudFetcherFactory, ProviderFetcher};
pub use retry::{RetryPolicy, RetryingFetcher};
pub use token::AccessToken;
