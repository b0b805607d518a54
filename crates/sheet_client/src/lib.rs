//! Remote sensor-sheet client library.
//!
//! Provides the series provider abstraction, an HTTP implementation of it,
//! a simulated source for local runs, and the retrying fetch wrapper.

pub mod http;
pub mod provider;
pub mod rate_limit;
pub mod retry;
pub mod simulated;

pub use http::HttpSeriesProvider;
pub use provider::{ProviderError, SeriesProvider};
pub use rate_limit::RateLimiter;
pub use retry::{FetchError, RetryPolicy, RetryingFetcher};
pub use simulated::SimulatedProvider;
