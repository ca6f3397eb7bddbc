//! Returns deliveries whose visibility timeout passed to the queue head.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use analyzer_core::traits::WorkQueue;

/// Periodically requeues expired deliveries.
///
/// Safe to run in every worker process: each expired receipt is moved back
/// exactly once by the queue.
#[derive(Debug, Clone)]
pub struct LeaseReaper {
    queue: Arc<dyn WorkQueue>,
    every: Duration,
}

impl LeaseReaper {
    /// Creates a reaper sweeping every `every`.
    pub fn new(queue: Arc<dyn WorkQueue>, every: Duration) -> Self {
        Self { queue, every }
    }

    /// One sweep. Returns how many deliveries were requeued.
    pub async fn sweep(&self) -> u64 {
        match self.queue.requeue_expired().await {
            Ok(0) => {
                debug!("No expired deliveries");
                0
            }
            Ok(n) => {
                info!(requeued = n, "Requeued expired deliveries");
                n
            }
            Err(e) => {
                error!(error = %e, "Failed to requeue expired deliveries");
                0
            }
        }
    }

    /// Sweep until `cancel` turns `true`.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
        debug!("Lease reaper stopped");
    }
}
