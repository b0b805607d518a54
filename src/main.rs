//! booth-sync: keeps booth sensor series cached and summarized.
//!
//! Single-binary Tokio application that:
//! 1. Loads the booth roster and sync settings
//! 2. Serves booth series from a TTL cache backed by the remote sheet API
//! 3. Re-warms the cache for every booth on a fixed period
//! 4. Optionally prints one portfolio report and exits

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use tracing::{error, info, warn};

use booth_metrics::portfolio_summary;
use common::{DateRange, SyncConfig};
use series_cache::{BackgroundRefresher, RefreshSettings, SeriesLoader, TtlCache};
use sheet_client::{
    HttpSeriesProvider, RateLimiter, RetryPolicy, RetryingFetcher, SeriesProvider,
    SimulatedProvider,
};

/// Booth sensor cache and refresher
#[derive(Parser)]
#[command(name = "booth-sync", about = "Booth sensor cache and refresher")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run a single refresh sweep, print the portfolio report as JSON, then exit.
    #[arg(long)]
    once: bool,

    /// Use generated readings instead of the remote sheet API.
    #[arg(long)]
    simulate: bool,
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const REPORT_DAYS: i64 = 30;

fn build_provider(cfg: &SyncConfig, simulate: bool) -> Result<Arc<dyn SeriesProvider>, common::Error> {
    if simulate || cfg.remote.base_url.is_empty() {
        info!("Using simulated sheet data");
        return Ok(Arc::new(SimulatedProvider::new()));
    }
    info!("Using sheet API at {}", cfg.remote.base_url);
    let provider = HttpSeriesProvider::new(
        &cfg.remote.base_url,
        Duration::from_secs(cfg.remote.timeout_secs),
    )?;
    Ok(Arc::new(provider))
}

fn build_loader(cfg: &SyncConfig, provider: Arc<dyn SeriesProvider>) -> SeriesLoader {
    let policy = RetryPolicy {
        max_attempts: cfg.fetch.max_attempts,
        backoff_base: Duration::from_millis(cfg.fetch.backoff_base_ms),
    };
    let mut fetcher = RetryingFetcher::new(provider, policy);
    match RateLimiter::per_second(cfg.fetch.requests_per_second) {
        Some(limiter) => fetcher = fetcher.with_rate_limiter(limiter),
        None => warn!("fetch.requests_per_second is 0; remote calls are not rate limited"),
    }

    let cache = Arc::new(TtlCache::new(Duration::from_secs(cfg.cache.ttl_secs)));
    let loader = SeriesLoader::new(cache, fetcher);
    if cfg.fetch.single_flight {
        loader.with_single_flight()
    } else {
        loader
    }
}

async fn run_once(refresher: &BackgroundRefresher, loader: &SeriesLoader, cfg: &SyncConfig) {
    let report = refresher.sweep().await;
    if !report.missing.is_empty() {
        warn!(
            missing = report.missing.len(),
            "Some booths have no data: {:?}",
            report.missing.iter().map(|k| k.as_str()).collect::<Vec<_>>()
        );
    }

    let roster = loader.load_roster(&cfg.booths).await;
    let range = DateRange::last_days(Local::now().naive_local(), REPORT_DAYS);
    let summary = portfolio_summary(&roster, &range);

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("Failed to serialize portfolio report: {}", e),
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "booth_sync=info,sheet_client=info,series_cache=info,booth_metrics=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("booth-sync starting up...");

    // Load configuration.
    let cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Booths: {:?}",
        cfg.booths.iter().map(|b| &b.booth_id).collect::<Vec<_>>()
    );
    info!(
        "Cache: ttl={}s, refresh every {}s with {}ms pacing, {} attempts from {}ms backoff",
        cfg.cache.ttl_secs,
        cfg.refresh.period_secs,
        cfg.refresh.pacing_ms,
        cfg.fetch.max_attempts,
        cfg.fetch.backoff_base_ms
    );

    let provider = match build_provider(&cfg, cli.simulate) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create sheet client: {}", e);
            std::process::exit(1);
        }
    };
    let loader = Arc::new(build_loader(&cfg, provider));
    let refresher = BackgroundRefresher::new(
        loader.clone(),
        cfg.booths.clone(),
        RefreshSettings {
            period: Duration::from_secs(cfg.refresh.period_secs),
            pacing: Duration::from_millis(cfg.refresh.pacing_ms),
        },
    );

    if cli.once {
        run_once(&refresher, &loader, &cfg).await;
        return;
    }

    // ── Spawn concurrent tasks ────────────────────────────────────────

    // Task 1: Background refresh
    let handle = refresher.spawn();

    // Task 2: Heartbeat
    let hb_cache = loader.cache().clone();
    let hb_booths = cfg.booths.len();
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            info!(
                "HEARTBEAT: cached={} booths={} ttl={}s",
                hb_cache.len(),
                hb_booths,
                hb_cache.ttl().as_secs()
            );
        }
    });

    info!("All tasks spawned. Press Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = heartbeat_handle => {
            error!("Heartbeat task exited: {:?}", r);
        }
    }

    handle.shutdown().await;
    info!("booth-sync stopped");
}
