//! Configuration loader — merges .env, config.toml, and BOOTH_SYNC_* env vars.

use common::config::SyncConfig;
use common::Error;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn parse_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer >= 0")))
}

fn parse_u32(raw: &str, env_name: &str) -> Result<u32, Error> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer >= 0")))
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

/// Apply `BOOTH_SYNC_*` overrides found through `lookup`.
fn apply_env_overrides(
    config: &mut SyncConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(url) = lookup("BOOTH_SYNC_BASE_URL") {
        config.remote.base_url = url.trim().to_string();
    }
    if let Some(raw) = lookup("BOOTH_SYNC_TIMEOUT_SECS") {
        config.remote.timeout_secs = parse_u64(&raw, "BOOTH_SYNC_TIMEOUT_SECS")?;
    }
    if let Some(raw) = lookup("BOOTH_SYNC_CACHE_TTL_SECS") {
        config.cache.ttl_secs = parse_u64(&raw, "BOOTH_SYNC_CACHE_TTL_SECS")?;
    }
    if let Some(raw) = lookup("BOOTH_SYNC_REFRESH_PERIOD_SECS") {
        config.refresh.period_secs = parse_u64(&raw, "BOOTH_SYNC_REFRESH_PERIOD_SECS")?;
    }
    if let Some(raw) = lookup("BOOTH_SYNC_REFRESH_PACING_MS") {
        config.refresh.pacing_ms = parse_u64(&raw, "BOOTH_SYNC_REFRESH_PACING_MS")?;
    }
    if let Some(raw) = lookup("BOOTH_SYNC_MAX_ATTEMPTS") {
        config.fetch.max_attempts = parse_u32(&raw, "BOOTH_SYNC_MAX_ATTEMPTS")?;
    }
    if let Some(raw) = lookup("BOOTH_SYNC_BACKOFF_BASE_MS") {
        config.fetch.backoff_base_ms = parse_u64(&raw, "BOOTH_SYNC_BACKOFF_BASE_MS")?;
    }
    if let Some(raw) = lookup("BOOTH_SYNC_REQUESTS_PER_SECOND") {
        config.fetch.requests_per_second = parse_u32(&raw, "BOOTH_SYNC_REQUESTS_PER_SECOND")?;
    }
    if let Some(raw) = lookup("BOOTH_SYNC_SINGLE_FLIGHT") {
        config.fetch.single_flight = parse_bool(&raw);
    }
    Ok(())
}

fn validate_config(config: &SyncConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.booths.is_empty() {
        issues.push("booths must contain at least one booth".into());
    }
    for (i, booth) in config.booths.iter().enumerate() {
        if booth.location.trim().is_empty() {
            issues.push(format!("booths[{i}].location must not be empty"));
        }
        if booth.booth.trim().is_empty() {
            issues.push(format!("booths[{i}].booth must not be empty"));
        }
        if booth.booth_id.trim().is_empty() {
            issues.push(format!("booths[{i}].booth_id must not be empty"));
        }
    }

    let base_url = config.remote.base_url.trim();
    if !base_url.is_empty() && !base_url.starts_with("http://") && !base_url.starts_with("https://")
    {
        issues.push("remote.base_url must start with http:// or https://".into());
    }
    if config.remote.timeout_secs == 0 {
        issues.push("remote.timeout_secs must be > 0".into());
    }
    if config.cache.ttl_secs == 0 {
        issues.push("cache.ttl_secs must be > 0".into());
    }
    if config.refresh.period_secs == 0 {
        issues.push("refresh.period_secs must be > 0".into());
    }
    if config.fetch.max_attempts == 0 {
        issues.push("fetch.max_attempts must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Booths whose names collapse to the same cache key share one series.
fn warn_on_key_collisions(config: &SyncConfig) {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for booth in &config.booths {
        let key = booth.cache_key().to_string();
        if let Some(first) = seen.insert(key.clone(), &booth.booth_id) {
            warn!(
                key = %key,
                "Booths {} and {} map to the same sheet and will share data",
                first,
                booth.booth_id
            );
        }
    }
}

/// Load configuration from `.env`, the TOML file at `path` (if present),
/// and the environment.
pub fn load_config(path: &Path) -> Result<SyncConfig, Error> {
    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file loaded: {}", e);
    }
    load_config_with(path, |name| std::env::var(name).ok())
}

/// Load the TOML file at `path` (if present) and apply overrides found
/// through `lookup`.
pub fn load_config_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SyncConfig, Error> {
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?
    } else {
        debug!("No config file at {}; using defaults", path.display());
        SyncConfig::default()
    };

    // Environment overrides win over the file.
    apply_env_overrides(&mut config, lookup)?;

    validate_config(&config)?;
    warn_on_key_collisions(&config);

    Ok(config)
}
