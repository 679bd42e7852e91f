use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::error::LimitsError;
use super::provider::LimitsProvider;
use super::snapshot::{ConfigSnapshot, LimitValues};

pub struct ConfigCache {
    snapshot: RwLock<Arc<ConfigSnapshot>>,
    defaults: LimitValues,
    provider: Arc<dyn LimitsProvider>,
    consecutive_failures: AtomicU64,
}

impl ConfigCache {
    pub fn new(defaults: LimitValues, provider: Arc<dyn LimitsProvider>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(ConfigSnapshot::defaults(defaults))),
            defaults,
            provider,
            consecutive_failures: AtomicU64::new(0),
        }
    }

    pub fn get(&self) -> Arc<ConfigSnapshot> {
        let guard = self
            .snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Fetches limits and installs them; the current snapshot is kept on error.
    pub async fn try_refresh(&self) -> Result<Arc<ConfigSnapshot>, LimitsError> {
        let result = self.provider.fetch_limits(&self.defaults).await;

        let limits = match result {
            Ok(limits) => limits,
            Err(err) => {
                self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
                return Err(err);
            }
        };

        let snapshot = Arc::new(if self.provider.is_remote() {
            ConfigSnapshot::fetched(limits, Utc::now())
        } else {
            ConfigSnapshot::defaults(limits)
        });
        {
            let mut guard = self
                .snapshot
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = Arc::clone(&snapshot);
        }
        self.consecutive_failures.store(0, Ordering::Relaxed);

        Ok(snapshot)
    }

    pub async fn refresh(&self) {
        match self.try_refresh().await {
            Ok(snapshot) => info!(limits = ?snapshot.limits, "limits refreshed"),
            Err(err) => error!(
                error = %err,
                consecutive_failures = self.consecutive_failures(),
                "failed to refresh limits, keeping previous snapshot"
            ),
        }
    }

    /// Spawns the refresh loop. The first refresh runs immediately.
    pub fn start(self: &Arc<Self>, every: Duration) -> RefreshTask {
        let cache = Arc::clone(self);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => cache.refresh().await,
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("limits refresh loop stopped");
        });

        info!(interval_secs = every.as_secs(), "limits refresh loop started");
        RefreshTask {
            shutdown_tx,
            handle,
        }
    }
}

pub struct RefreshTask {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.handle.await {
            error!(error = %err, "limits refresh loop ended abnormally");
        }
    }
}
