//! Resilient upstream fetching for Stash.
//!
//! Provides the HTTP client every provider adapter goes through: per-attempt
//! timeouts, bounded exponential-backoff retries, error classification and
//! per-target counters. Also provides a config-driven JSON endpoint fetcher.

pub mod client;
pub mod endpoint;
pub mod metrics;
pub mod retry;

pub use client::{FetchClient, FetchConfig, FetchResponse, RequestOptions};
pub use endpoint::{EndpointConfig, JsonEndpoint};
pub use metrics::{TargetCounters, UpstreamMetrics};
pub use retry::RetryPolicy;
