//! The remote tabular source, seen as "rows for a named key".

use async_trait::async_trait;
use common::{CacheKey, RawRow};
use thiserror::Error;

/// Outcome of a failed provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The source has no sheet for this key. Permanent; never retried.
    #[error("no series named {0}")]
    NotFound(String),

    /// Network blip, rate limit, bad gateway and the like.
    #[error("transient provider failure: {0}")]
    Transient(String),
}

#[async_trait]
pub trait SeriesProvider: Send + Sync {
    /// Fetch every row recorded for `key`.
    async fn fetch(&self, key: &CacheKey) -> Result<Vec<RawRow>, ProviderError>;
}
