//! Bounded exponential-backoff wrapper around a [`SeriesProvider`].
//!
//! Not-found is permanent and returns after one call. Transient failures are
//! retried after `backoff_base * 2^attempt`; the wait suspends only the
//! calling task.

use std::sync::Arc;
use std::time::Duration;

use common::{CacheKey, RawRow};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::provider::{ProviderError, SeriesProvider};
use crate::rate_limit::RateLimiter;

/// Why a fetch produced no rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("series {key} not found")]
    NotFound { key: String },

    #[error("gave up on {key} after {attempts} attempts: {last}")]
    ExhaustedRetries {
        key: String,
        attempts: u32,
        last: ProviderError,
    },
}

/// Attempt budget and backoff unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Wait after the failed attempt `attempt` (0-based): 1, 2, 4 … units.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

#[derive(Clone)]
pub struct RetryingFetcher {
    provider: Arc<dyn SeriesProvider>,
    policy: RetryPolicy,
    limiter: Option<RateLimiter>,
}

impl RetryingFetcher {
    pub fn new(provider: Arc<dyn SeriesProvider>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            limiter: None,
        }
    }

    /// Pace every provider call through `limiter`.
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub async fn fetch(&self, key: &CacheKey) -> Result<Vec<RawRow>, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last = None;

        for attempt in 0..max_attempts {
            if let Some(limiter) = &self.limiter {
                limiter.wait().await;
            }

            match self.provider.fetch(key).await {
                Ok(rows) => {
                    debug!(key = %key, attempt = attempt + 1, rows = rows.len(), "Fetch succeeded");
                    return Ok(rows);
                }
                Err(ProviderError::NotFound(_)) => {
                    warn!(
                        key = %key,
                        attempt = attempt + 1,
                        max_attempts,
                        "Sheet not found; not retrying"
                    );
                    return Err(FetchError::NotFound {
                        key: key.to_string(),
                    });
                }
                Err(e) => {
                    if attempt + 1 < max_attempts {
                        let wait = self.policy.backoff(attempt);
                        warn!(
                            key = %key,
                            attempt = attempt + 1,
                            max_attempts,
                            "Fetch failed, retrying in {:?}: {}",
                            wait,
                            e
                        );
                        last = Some(e);
                        sleep(wait).await;
                    } else {
                        error!(
                            key = %key,
                            attempt = attempt + 1,
                            max_attempts,
                            "Fetch failed after {} attempts: {}",
                            max_attempts,
                            e
                        );
                        last = Some(e);
                    }
                }
            }
        }

        Err(FetchError::ExhaustedRetries {
            key: key.to_string(),
            attempts: max_attempts,
            last: last.unwrap_or_else(|| ProviderError::Transient("no attempt made".into())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::RawValue;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tokio::time::Instant;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Replays scripted outcomes, then answers with the fallback.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<Vec<RawRow>, ProviderError>>>,
        fallback: Result<Vec<RawRow>, ProviderError>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedProvider {
        fn new(
            script: Vec<Result<Vec<RawRow>, ProviderError>>,
            fallback: Result<Vec<RawRow>, ProviderError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SeriesProvider for ScriptedProvider {
        async fn fetch(&self, _key: &CacheKey) -> Result<Vec<RawRow>, ProviderError> {
            self.calls.lock().unwrap().push(Instant::now());
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn one_row() -> Vec<RawRow> {
        let mut row = RawRow::new();
        row.insert("temp_c".into(), Some(RawValue::Number(21.0)));
        vec![row]
    }

    fn transient() -> Result<Vec<RawRow>, ProviderError> {
        Err(ProviderError::Transient("503 from upstream".into()))
    }

    fn assert_gap(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(5),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    /// Records the fields of every event it sees.
    #[derive(Clone, Default)]
    struct CapturedEvents(Arc<Mutex<Vec<HashMap<String, String>>>>);

    struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

    impl tracing::field::Visit for FieldVisitor<'_> {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{value:?}"));
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for CapturedEvents {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = HashMap::new();
            event.record(&mut FieldVisitor(&mut fields));
            self.0.lock().unwrap().push(fields);
        }
    }

    fn key() -> CacheKey {
        CacheKey::new("Adelaide", "Booth A")
    }

    #[test]
    fn test_backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rows_returned_on_first_success() {
        let provider = ScriptedProvider::new(vec![Ok(one_row())], transient());
        let fetcher = RetryingFetcher::new(provider.clone(), RetryPolicy::default());

        let rows = fetcher.fetch(&key()).await.expect("rows");

        assert_eq!(rows.len(), 1);
        assert_eq!(provider.call_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_calls_provider_once() {
        let provider = ScriptedProvider::new(
            vec![],
            Err(ProviderError::NotFound("Adelaide_BoothA".into())),
        );
        let fetcher = RetryingFetcher::new(provider.clone(), RetryPolicy::default());

        let err = fetcher.fetch(&key()).await.expect_err("not found");

        assert_eq!(
            err,
            FetchError::NotFound {
                key: "Adelaide_BoothA".into()
            }
        );
        assert_eq!(provider.call_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_exhaust_with_exponential_waits() {
        let provider = ScriptedProvider::new(vec![], transient());
        let fetcher = RetryingFetcher::new(provider.clone(), RetryPolicy::default());

        let err = fetcher.fetch(&key()).await.expect_err("exhausted");

        match err {
            FetchError::ExhaustedRetries { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(last, ProviderError::Transient("503 from upstream".into()));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let calls = provider.call_times();
        assert_eq!(calls.len(), 3);
        assert_gap(calls[1] - calls[0], Duration::from_secs(1));
        assert_gap(calls[2] - calls[1], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let provider = ScriptedProvider::new(vec![transient(), Ok(one_row())], transient());
        let fetcher = RetryingFetcher::new(provider.clone(), RetryPolicy::default());

        let rows = fetcher.fetch(&key()).await.expect("second attempt succeeds");

        assert_eq!(rows.len(), 1);
        assert_eq!(provider.call_times().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_after_transient_stops_retrying() {
        let provider = ScriptedProvider::new(
            vec![transient(), Err(ProviderError::NotFound("x".into()))],
            transient(),
        );
        let fetcher = RetryingFetcher::new(
            provider.clone(),
            RetryPolicy {
                max_attempts: 5,
                backoff_base: Duration::from_millis(10),
            },
        );

        assert!(matches!(
            fetcher.fetch(&key()).await,
            Err(FetchError::NotFound { .. })
        ));
        assert_eq!(provider.call_times().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_event_carries_key_and_attempt() {
        let events = CapturedEvents::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(events.clone()));
        let provider = ScriptedProvider::new(
            vec![transient()],
            Err(ProviderError::NotFound("Adelaide_BoothA".into())),
        );
        let fetcher = RetryingFetcher::new(provider, RetryPolicy::default());

        let _ = fetcher.fetch(&key()).await;

        let logged = events.0.lock().unwrap().clone();
        let not_found = logged
            .iter()
            .find(|e| e.get("message").is_some_and(|m| m.contains("not found")))
            .expect("not-found event logged");
        assert_eq!(not_found.get("key").map(String::as_str), Some("Adelaide_BoothA"));
        assert_eq!(not_found.get("attempt").map(String::as_str), Some("2"));
        assert_eq!(not_found.get("max_attempts").map(String::as_str), Some("3"));
    }
}
