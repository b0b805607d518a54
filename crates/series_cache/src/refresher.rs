//! Periodic cache warming for the whole booth roster.
//!
//! Every `period` the refresher walks the roster once, loading each booth
//! through the [`SeriesLoader`] with a fixed pause between booths so the
//! remote source's rate limit is respected.

use std::sync::Arc;
use std::time::Duration;

use common::{BoothConfig, CacheKey};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::loader::SeriesLoader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSettings {
    /// Wait before each sweep. Matches the cache TTL by default.
    pub period: Duration,
    /// Pause between successive booth loads.
    pub pacing: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(120),
            pacing: Duration::from_millis(500),
        }
    }
}

/// Outcome of one pass over the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub loaded: usize,
    pub missing: Vec<CacheKey>,
    pub elapsed: Duration,
    /// Shutdown arrived before every booth was visited.
    pub interrupted: bool,
}

pub struct BackgroundRefresher {
    loader: Arc<SeriesLoader>,
    roster: Arc<[BoothConfig]>,
    settings: RefreshSettings,
}

impl BackgroundRefresher {
    pub fn new(
        loader: Arc<SeriesLoader>,
        roster: impl Into<Arc<[BoothConfig]>>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            loader,
            roster: roster.into(),
            settings,
        }
    }

    /// Load every booth once.
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_until(&CancellationToken::new()).await
    }

    async fn sweep_until(&self, shutdown: &CancellationToken) -> SweepReport {
        info!(booths = self.roster.len(), "Refreshing booth data (background)");
        let started = Instant::now();
        let mut loaded = 0usize;
        let mut missing = Vec::new();
        let mut interrupted = false;

        for (i, booth) in self.roster.iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    _ = shutdown.cancelled() => { interrupted = true; break; }
                    _ = sleep(self.settings.pacing) => {}
                }
            }

            let key = booth.cache_key();
            let outcome = tokio::select! {
                _ = shutdown.cancelled() => { interrupted = true; break; }
                series = self.loader.load_key(&key) => series,
            };
            match outcome {
                Some(_) => loaded += 1,
                None => {
                    warn!(key = %key, "Refresh produced no data for booth");
                    missing.push(key);
                }
            }
        }

        let report = SweepReport {
            loaded,
            missing,
            elapsed: started.elapsed(),
            interrupted,
        };
        if interrupted {
            info!(loaded = report.loaded, "Refresh sweep interrupted by shutdown");
        } else {
            info!(
                loaded = report.loaded,
                missing = report.missing.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Cache refresh completed"
            );
        }
        report
    }

    /// Sweep every `period` until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            booths = self.roster.len(),
            period_secs = self.settings.period.as_secs(),
            "Background refresher started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.settings.period) => {}
            }
            if self.sweep_until(&shutdown).await.interrupted {
                break;
            }
        }

        info!("Background refresher stopped");
    }

    /// Start [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> RefresherHandle {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.run(shutdown.clone()));
        RefresherHandle { task, shutdown }
    }
}

/// Owner of a spawned refresher task.
pub struct RefresherHandle {
    task: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl RefresherHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal the task to stop and wait for it.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!("Refresher task ended abnormally: {}", e);
        }
    }
}
