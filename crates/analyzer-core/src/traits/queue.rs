//! Work queue trait: a FIFO of job ids with lease-based redelivery.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::types::JobId;

/// One hand-off of a job id to a worker.
///
/// The receipt is unique per delivery. Acknowledging or extending with a
/// stale receipt (one whose lease already expired and was redelivered) is
/// a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// The job to process.
    pub job_id: JobId,
    /// Opaque delivery receipt.
    pub receipt: String,
}

/// Queue occupancy snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepth {
    /// Items waiting for a worker.
    pub pending: u64,
    /// Items delivered and not yet acknowledged.
    pub in_flight: u64,
}

/// At-least-once work queue shared by any number of workers.
///
/// Items are handed out in enqueue order. A delivered item stays invisible
/// until it is acknowledged or its visibility timeout passes, after which
/// [`WorkQueue::requeue_expired`] makes it deliverable again.
#[async_trait]
pub trait WorkQueue: Send + Sync + std::fmt::Debug + 'static {
    /// Append a job id to the tail of the queue.
    async fn enqueue(&self, job_id: JobId) -> AppResult<()>;

    /// Take the head item, leasing it for `visibility`. `None` when empty.
    async fn dequeue(&self, visibility: Duration) -> AppResult<Option<Delivery>>;

    /// Remove a delivered item for good. Returns `false` for a stale receipt.
    async fn ack(&self, delivery: &Delivery) -> AppResult<bool>;

    /// Push the lease deadline out by `visibility` from now.
    async fn extend(&self, delivery: &Delivery, visibility: Duration) -> AppResult<bool>;

    /// Return a delivered item to the head of the queue right away.
    async fn release(&self, delivery: &Delivery) -> AppResult<bool>;

    /// Move every item whose lease has passed back to the head of the queue.
    async fn requeue_expired(&self) -> AppResult<u64>;

    /// Current pending and in-flight counts.
    async fn depth(&self) -> AppResult<QueueDepth>;

    /// Check that the broker is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
