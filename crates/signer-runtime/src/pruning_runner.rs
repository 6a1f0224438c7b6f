//! Scheduled pruning.

use std::sync::Arc;
use std::time::Duration;

use slashing_protection::{PruneSummary, SlashingProtection};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

/// Runs a pruning pass every `interval` until shutdown is signalled.
pub struct PruningRunner {
    protection: Arc<dyn SlashingProtection>,
    interval: Duration,
}

impl PruningRunner {
    pub fn new(protection: Arc<dyn SlashingProtection>, interval: Duration) -> Self {
        Self {
            protection,
            interval,
        }
    }

    /// One pass on a blocking worker. `None` if the worker died.
    pub async fn prune_once(&self) -> Option<PruneSummary> {
        let protection = Arc::clone(&self.protection);
        match tokio::task::spawn_blocking(move || protection.prune()).await {
            Ok(summary) => Some(summary),
            Err(err) => {
                error!(error = %err, "Pruning task failed");
                None
            }
        }
    }

    /// First pass one interval after start. Returns the number of passes run.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> usize {
        info!(interval_secs = self.interval.as_secs(), "Pruning runner started");
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut passes = 0;
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.prune_once().await;
                    passes += 1;
                }
            }
        }
        info!(passes, "Pruning runner stopped");
        passes
    }
}
