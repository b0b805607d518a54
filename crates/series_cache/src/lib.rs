//! Cache-aside synchronization engine for booth sensor series.
//!
//! `SeriesLoader` serves series from a TTL cache and falls back to the
//! retrying remote fetch on a miss; `BackgroundRefresher` keeps the cache
//! warm for the whole roster.

pub mod cache;
pub mod clock;
pub mod loader;
pub mod normalize;
pub mod refresher;

pub use cache::TtlCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use loader::SeriesLoader;
pub use normalize::normalize;
pub use refresher::{BackgroundRefresher, RefreshSettings, RefresherHandle, SweepReport};
