//! Lease heartbeat for a running job.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use analyzer_core::traits::{Delivery, WorkQueue};
use analyzer_database::JobStore;
use analyzer_entity::job::JobLease;

/// Keeps a job lease and its queue delivery alive while a job runs.
///
/// Every tick renews the store lease and extends the queue visibility. If
/// the store reports the lease as superseded, the `lost` signal flips to
/// `true` and the heartbeat stops. Dropping the heartbeat stops it.
#[derive(Debug)]
pub struct Heartbeat {
    handle: JoinHandle<()>,
    lost: watch::Receiver<bool>,
}

impl Heartbeat {
    /// Start beating every `period`, renewing for `lease_ttl` each time.
    pub fn spawn(
        jobs: Arc<dyn JobStore>,
        queue: Arc<dyn WorkQueue>,
        lease: JobLease,
        delivery: Delivery,
        period: Duration,
        lease_ttl: Duration,
    ) -> Self {
        let (tx, lost) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match jobs.renew(&lease, lease_ttl).await {
                    Ok(Some(_)) => {
                        debug!(job_id = %lease.job_id, generation = lease.generation, "Lease renewed");
                    }
                    Ok(None) => {
                        warn!(job_id = %lease.job_id, generation = lease.generation, "Lease lost");
                        let _ = tx.send(true);
                        return;
                    }
                    Err(e) => {
                        warn!(job_id = %lease.job_id, error = %e, "Lease renewal failed");
                    }
                }

                match queue.extend(&delivery, lease_ttl).await {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(job_id = %delivery.job_id, "Queue delivery no longer held");
                    }
                    Err(e) => {
                        warn!(job_id = %delivery.job_id, error = %e, "Failed to extend queue delivery");
                    }
                }
            }
        });
        Self { handle, lost }
    }

    /// A receiver that turns `true` once the lease is lost.
    pub fn lost(&self) -> watch::Receiver<bool> {
        self.lost.clone()
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Resolves once `lost` turns `true`. Never resolves if the heartbeat ends
/// without losing the lease.
pub async fn wait_lost(mut lost: watch::Receiver<bool>) {
    if lost.wait_for(|lost| *lost).await.is_err() {
        std::future::pending::<()>().await;
    }
}
