//! In-process work queue for single-node deployments and tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use analyzer_core::result::AppResult;
use analyzer_core::traits::{Delivery, QueueDepth, WorkQueue};
use analyzer_core::types::JobId;

use crate::receipt;

#[derive(Debug, Default)]
struct State {
    pending: VecDeque<JobId>,
    leases: HashMap<String, Lease>,
}

#[derive(Debug, Clone, Copy)]
struct Lease {
    job_id: JobId,
    deadline: Instant,
}

/// Work queue held in process memory. Lost on restart.
#[derive(Debug, Default)]
pub struct MemoryWorkQueue {
    state: Mutex<State>,
}

impl MemoryWorkQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn enqueue(&self, job_id: JobId) -> AppResult<()> {
        self.state.lock().await.pending.push_back(job_id);
        debug!(job_id = %job_id, "Enqueued job");
        Ok(())
    }

    async fn dequeue(&self, visibility: Duration) -> AppResult<Option<Delivery>> {
        let mut state = self.state.lock().await;
        let Some(job_id) = state.pending.pop_front() else {
            return Ok(None);
        };
        let receipt = receipt::issue(job_id);
        state.leases.insert(
            receipt.clone(),
            Lease {
                job_id,
                deadline: Instant::now() + visibility,
            },
        );
        Ok(Some(Delivery { job_id, receipt }))
    }

    async fn ack(&self, delivery: &Delivery) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .leases
            .remove(&delivery.receipt)
            .is_some())
    }

    async fn extend(&self, delivery: &Delivery, visibility: Duration) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.leases.get_mut(&delivery.receipt) {
            Some(lease) => {
                lease.deadline = Instant::now() + visibility;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn release(&self, delivery: &Delivery) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.leases.remove(&delivery.receipt) {
            Some(lease) => {
                state.pending.push_front(lease.job_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn requeue_expired(&self) -> AppResult<u64> {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        let mut expired: Vec<(String, Lease)> = state
            .leases
            .iter()
            .filter(|(_, lease)| lease.deadline <= now)
            .map(|(receipt, lease)| (receipt.clone(), *lease))
            .collect();
        // Oldest deadline ends up at the very head.
        expired.sort_by_key(|(_, lease)| std::cmp::Reverse(lease.deadline));

        for (receipt, lease) in &expired {
            state.leases.remove(receipt);
            state.pending.push_front(lease.job_id);
        }
        Ok(expired.len() as u64)
    }

    async fn depth(&self) -> AppResult<QueueDepth> {
        let state = self.state.lock().await;
        Ok(QueueDepth {
            pending: state.pending.len() as u64,
            in_flight: state.leases.len() as u64,
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
