//! Service configuration types.

use serde::{Deserialize, Serialize};

use crate::types::CacheKey;

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote tabular source settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Series cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Background refresh timing.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Remote fetch retry and pacing.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Every monitored booth. Loaded once at startup and never mutated.
    #[serde(default)]
    pub booths: Vec<BoothConfig>,
}

/// One entry of the booth roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoothConfig {
    /// Site name (e.g., "Adelaide").
    pub location: String,
    /// Booth name within the site (e.g., "Booth A").
    pub booth: String,
    /// Stable identifier shown on reports.
    pub booth_id: String,
    /// Seats in the booth; denominator of capacity utilization.
    #[serde(default)]
    pub max_occupancy: u32,
}

impl BoothConfig {
    /// Key under which this booth's series is fetched and cached.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.location, &self.booth)
    }
}

/// Remote source connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the series endpoint. Empty means "use simulated data".
    #[serde(default)]
    pub base_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Age at which a cached series is treated as absent (seconds).
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

/// Background refresh timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Interval between roster sweeps (seconds).
    #[serde(default = "default_refresh_period")]
    pub period_secs: u64,

    /// Delay between successive booth loads inside one sweep (milliseconds).
    #[serde(default = "default_pacing")]
    pub pacing_ms: u64,
}

/// Fetch retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Provider calls per fetch before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff wait; doubles on every further attempt (milliseconds).
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Client-side cap on remote calls per second (0 disables the limiter).
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// De-duplicate concurrent misses on the same key.
    #[serde(default)]
    pub single_flight: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_timeout() -> u64 {
    30
}
fn default_ttl() -> u64 {
    120
}
fn default_refresh_period() -> u64 {
    120
}
fn default_pacing() -> u64 {
    500
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base() -> u64 {
    1000
}
fn default_requests_per_second() -> u32 {
    1
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            period_secs: default_refresh_period(),
            pacing_ms: default_pacing(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            requests_per_second: default_requests_per_second(),
            single_flight: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            cache: CacheConfig::default(),
            refresh: RefreshConfig::default(),
            fetch: FetchConfig::default(),
            booths: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_remote_quota_profile() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.cache.ttl_secs, 120);
        assert_eq!(cfg.refresh.period_secs, cfg.cache.ttl_secs);
        assert_eq!(cfg.refresh.pacing_ms, 500);
        assert_eq!(cfg.fetch.max_attempts, 3);
        assert_eq!(cfg.fetch.backoff_base_ms, 1000);
        assert!(!cfg.fetch.single_flight);
        assert!(cfg.booths.is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let raw = r#"
            [cache]
            ttl_secs = 60

            [[booths]]
            location = "Adelaide"
            booth = "Booth A"
            booth_id = "ADL-01"
            max_occupancy = 4
        "#;
        let cfg: SyncConfig = toml::from_str(raw).expect("config should parse");

        assert_eq!(cfg.cache.ttl_secs, 60);
        assert_eq!(cfg.refresh.period_secs, 120);
        assert_eq!(cfg.booths.len(), 1);
        assert_eq!(cfg.booths[0].cache_key().as_str(), "Adelaide_BoothA");
    }
}
