//! In-memory TTL cache of booth series.
//!
//! One mutex guards the whole map. The key space (location × booth) is small,
//! and the lock is only held for the map operation itself, never across a
//! remote fetch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use common::{CacheKey, Series};
use tracing::debug;

use crate::clock::{Clock, SystemClock};

/// A cached series with the instant it was stored.
#[derive(Debug, Clone)]
struct CacheEntry {
    series: Series,
    fetched_at: Instant,
}

impl CacheEntry {
    fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.fetched_at) >= ttl
    }
}

/// Thread-safe series cache keyed by booth.
pub struct TtlCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(120);

    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        // Entries are replaced whole, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cached series for `key`. A stale entry is removed and reported as absent.
    pub fn get(&self, key: &CacheKey) -> Option<Series> {
        let now = self.clock.now();
        let mut entries = self.lock();
        if entries.get(key)?.is_stale(now, self.ttl) {
            entries.remove(key);
            debug!(key = %key, "Evicted stale cache entry");
            return None;
        }
        entries.get(key).map(|entry| entry.series.clone())
    }

    /// Store `series` for `key`, replacing any previous entry.
    pub fn set(&self, key: CacheKey, series: Series) {
        let fetched_at = self.clock.now();
        self.lock().insert(key, CacheEntry { series, fetched_at });
    }

    /// True when `key` has no entry or its entry has reached the TTL.
    pub fn is_expired(&self, key: &CacheKey) -> bool {
        let now = self.clock.now();
        self.lock()
            .get(key)
            .map_or(true, |entry| entry.is_stale(now, self.ttl))
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, stale ones included until they are read.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
