//! Cache-aside loading of booth series.

use std::sync::Arc;

use common::{BoothConfig, CacheKey, Series};
use dashmap::DashMap;
use sheet_client::{FetchError, RetryingFetcher};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::cache::TtlCache;
use crate::normalize::normalize;

/// Serves series from the cache and refills it from the remote source.
///
/// Every "no data" outcome (unknown sheet, exhausted retries, empty sheet) is
/// returned as `None` and told apart only through the logs.
pub struct SeriesLoader {
    cache: Arc<TtlCache>,
    fetcher: RetryingFetcher,
    in_flight: Option<DashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl SeriesLoader {
    pub fn new(cache: Arc<TtlCache>, fetcher: RetryingFetcher) -> Self {
        Self {
            cache,
            fetcher,
            in_flight: None,
        }
    }

    /// Let only one caller per key fetch at a time; the others wait and then
    /// read what it stored.
    pub fn with_single_flight(mut self) -> Self {
        self.in_flight = Some(DashMap::new());
        self
    }

    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    pub async fn load(&self, location: &str, booth: &str) -> Option<Series> {
        self.load_key(&CacheKey::new(location, booth)).await
    }

    pub async fn load_key(&self, key: &CacheKey) -> Option<Series> {
        if let Some(series) = self.cache.get(key) {
            debug!(key = %key, "Cache hit");
            return Some(series);
        }
        debug!(key = %key, "Cache miss");

        match &self.in_flight {
            Some(in_flight) => {
                let guard = in_flight
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone();
                let _fetching = guard.lock().await;
                if let Some(series) = self.cache.get(key) {
                    debug!(key = %key, "Filled by concurrent fetch");
                    return Some(series);
                }
                self.fetch_and_store(key).await
            }
            None => self.fetch_and_store(key).await,
        }
    }

    /// Load every booth of `roster` in order.
    pub async fn load_roster(&self, roster: &[BoothConfig]) -> Vec<(BoothConfig, Option<Series>)> {
        let mut loaded = Vec::with_capacity(roster.len());
        for booth in roster {
            let series = self.load_key(&booth.cache_key()).await;
            loaded.push((booth.clone(), series));
        }
        loaded
    }

    async fn fetch_and_store(&self, key: &CacheKey) -> Option<Series> {
        let rows = match self.fetcher.fetch(key).await {
            Ok(rows) => rows,
            Err(FetchError::NotFound { .. }) => {
                warn!(key = %key, "No sheet for booth; serving no data");
                return None;
            }
            Err(e @ FetchError::ExhaustedRetries { attempts, .. }) => {
                error!(key = %key, attempts, "Could not fetch booth data: {}", e);
                return None;
            }
        };

        if rows.is_empty() {
            warn!(key = %key, "Sheet has no rows; serving no data");
            return None;
        }

        let series = normalize(rows);
        self.cache.set(key.clone(), series.clone());
        info!(key = %key, rows = series.len(), "Loaded and cached booth data");
        Some(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use common::{RawRow, RawValue};
    use sheet_client::{ProviderError, RetryPolicy, SeriesProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves fixed rows after a short delay and counts calls.
    struct CountingProvider {
        outcome: Result<Vec<RawRow>, ProviderError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new(outcome: Result<Vec<RawRow>, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                delay: Duration::from_millis(50),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SeriesProvider for CountingProvider {
        async fn fetch(&self, _key: &CacheKey) -> Result<Vec<RawRow>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.outcome.clone()
        }
    }

    fn rows() -> Vec<RawRow> {
        ["2025-03-01 11:00", "2025-03-01 10:00"]
            .iter()
            .enumerate()
            .map(|(i, ts)| {
                let mut row = RawRow::new();
                row.insert("timestamp".into(), Some(RawValue::Text((*ts).into())));
                row.insert("temp_c".into(), Some(RawValue::Number(20.0 + i as f64)));
                row
            })
            .collect()
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(10),
        }
    }

    fn loader_with(
        provider: Arc<CountingProvider>,
        clock: Arc<ManualClock>,
    ) -> SeriesLoader {
        let cache = Arc::new(TtlCache::with_clock(Duration::from_secs(120), clock));
        SeriesLoader::new(cache, RetryingFetcher::new(provider, fast_policy()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_served_without_remote_call() {
        let provider = CountingProvider::new(Ok(rows()));
        let clock = Arc::new(ManualClock::new());
        let loader = loader_with(provider.clone(), clock.clone());

        let first = loader.load("Adelaide", "Booth A").await.expect("loaded");
        clock.advance(Duration::from_secs(119));
        let second = loader.load("Adelaide", "Booth A").await.expect("cached");

        assert_eq!(provider.calls(), 1);
        assert_eq!(first, second);
        assert!(first.shares_storage(&second));
        assert_eq!(first.readings()[0].temp_c, Some(21.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_triggers_fresh_fetch() {
        let provider = CountingProvider::new(Ok(rows()));
        let clock = Arc::new(ManualClock::new());
        let loader = loader_with(provider.clone(), clock.clone());

        loader.load("Adelaide", "Booth A").await.expect("loaded");
        clock.advance(Duration::from_secs(120));
        loader.load("Adelaide", "Booth A").await.expect("reloaded");

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_returns_none_and_leaves_cache_alone() {
        let provider = CountingProvider::new(Err(ProviderError::NotFound("x".into())));
        let loader = loader_with(provider.clone(), Arc::new(ManualClock::new()));

        assert!(loader.load("Ghost", "Booth").await.is_none());
        assert_eq!(provider.calls(), 1);
        assert!(loader.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_none() {
        let provider = CountingProvider::new(Err(ProviderError::Transient("timeout".into())));
        let loader = loader_with(provider.clone(), Arc::new(ManualClock::new()));

        assert!(loader.load("Adelaide", "Booth A").await.is_none());
        assert_eq!(provider.calls(), 3);
        assert!(loader.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_sheet_is_not_cached() {
        let provider = CountingProvider::new(Ok(Vec::new()));
        let loader = loader_with(provider.clone(), Arc::new(ManualClock::new()));

        assert!(loader.load("Adelaide", "Booth A").await.is_none());
        assert!(loader.load("Adelaide", "Booth A").await.is_none());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_all_get_whole_series() {
        let provider = CountingProvider::new(Ok(rows()));
        let loader = Arc::new(loader_with(provider.clone(), Arc::new(ManualClock::new())));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let loader = loader.clone();
                tokio::spawn(async move { loader.load("Adelaide", "Booth A").await })
            })
            .collect();

        for handle in handles {
            let series = handle.await.expect("task joined").expect("series loaded");
            assert_eq!(series.len(), 2);
            assert!(series.readings()[0].timestamp < series.readings()[1].timestamp);
        }
        assert!(provider.calls() >= 1);
        let cached = loader.cache().get(&CacheKey::new("Adelaide", "Booth A"));
        assert_eq!(cached.map(|s| s.len()), Some(2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_flight_collapses_concurrent_misses() {
        let provider = CountingProvider::new(Ok(rows()));
        let loader =
            Arc::new(loader_with(provider.clone(), Arc::new(ManualClock::new())).with_single_flight());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let loader = loader.clone();
                tokio::spawn(async move { loader.load("Adelaide", "Booth A").await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.expect("task joined").is_some());
        }
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_roster_keeps_order_and_gaps() {
        let provider = CountingProvider::new(Ok(rows()));
        let loader = loader_with(provider, Arc::new(ManualClock::new()));
        let roster = vec![
            BoothConfig {
                location: "Adelaide".into(),
                booth: "Booth A".into(),
                booth_id: "ADL-A".into(),
                max_occupancy: 4,
            },
            BoothConfig {
                location: "Adelaide".into(),
                booth: "Booth B".into(),
                booth_id: "ADL-B".into(),
                max_occupancy: 2,
            },
        ];

        let loaded = loader.load_roster(&roster).await;

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].0.booth_id, "ADL-A");
        assert!(loaded.iter().all(|(_, s)| s.is_some()));
    }
}
