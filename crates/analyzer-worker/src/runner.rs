//! Worker runner: main loop that pulls deliveries and processes them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::time;
use tracing;

use crate::processor::{JobProcessor, ProcessOutcome};
use crate::reaper::LeaseReaper;

/// How long shutdown waits for in-flight jobs.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Polls the work queue and runs jobs with bounded concurrency.
#[derive(Debug, Clone)]
pub struct WorkerRunner {
    /// Per-delivery state machine.
    processor: Arc<JobProcessor>,
}

impl WorkerRunner {
    /// Create a new worker runner.
    pub fn new(processor: JobProcessor) -> Self {
        Self {
            processor: Arc::new(processor),
        }
    }

    /// Generate a worker identifier unique to this process.
    pub fn generate_worker_id() -> String {
        format!("worker-{}", uuid::Uuid::new_v4().simple())
    }

    /// Start the runner. Returns after `cancel` turns `true` and in-flight
    /// jobs have finished or the grace period ran out.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        let config = self.processor.config().clone();
        let worker_id = self.processor.worker_id().to_string();
        tracing::info!(
            worker_id = %worker_id,
            concurrency = config.concurrency,
            poll_interval_ms = config.poll_interval_ms,
            lease_ttl_s = config.lease_ttl_seconds,
            "Worker started"
        );

        let reaper = LeaseReaper::new(
            self.processor.queue().clone(),
            Duration::from_secs(config.reaper_interval_seconds.max(1)),
        );
        let reaper_cancel = cancel.clone();
        let reaper_task = tokio::spawn(async move { reaper.run(reaper_cancel).await });

        let concurrency = config.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let poll_interval = Duration::from_millis(config.poll_interval_ms);

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!(worker_id = %worker_id, "Worker received shutdown signal");
                        break;
                    }
                }
                got_work = self.poll_and_execute(&semaphore) => {
                    if got_work {
                        continue;
                    }
                    tokio::select! {
                        changed = cancel.changed() => {
                            if changed.is_err() || *cancel.borrow() {
                                tracing::info!(worker_id = %worker_id, "Worker shutting down");
                                break;
                            }
                        }
                        _ = time::sleep(poll_interval) => {}
                    }
                }
            }
        }

        tracing::info!(worker_id = %worker_id, "Waiting for in-flight jobs to complete");
        let _ = time::timeout(SHUTDOWN_GRACE, semaphore.acquire_many(concurrency as u32)).await;
        let _ = reaper_task.await;
        tracing::info!(worker_id = %worker_id, "Worker shut down");
    }

    /// Take one delivery if a slot is free and start processing it.
    /// Returns whether a delivery was taken.
    async fn poll_and_execute(&self, semaphore: &Arc<Semaphore>) -> bool {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::trace!("All worker slots occupied");
                return false;
            }
        };

        let visibility = self.processor.config().lease_ttl();
        match self.processor.queue().dequeue(visibility).await {
            Ok(Some(delivery)) => {
                let processor = Arc::clone(&self.processor);
                tokio::spawn(async move {
                    let _permit = permit;
                    let job_id = delivery.job_id;
                    let outcome = processor.process(delivery).await;
                    tracing::debug!(job_id = %job_id, outcome = ?outcome, "Delivery processed");
                });
                true
            }
            Ok(None) => {
                tracing::trace!("No deliveries available");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to dequeue");
                false
            }
        }
    }

    /// Process deliveries one at a time until the queue has nothing
    /// visible. Returns the outcomes in order.
    pub async fn drain(&self) -> Vec<ProcessOutcome> {
        let visibility = self.processor.config().lease_ttl();
        let mut outcomes = Vec::new();
        loop {
            match self.processor.queue().dequeue(visibility).await {
                Ok(Some(delivery)) => outcomes.push(self.processor.process(delivery).await),
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to dequeue");
                    break;
                }
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use analyzer_cache::memory::MemoryCacheProvider;
    use analyzer_cache::{CacheInvalidator, ReadThroughCache};
    use analyzer_core::config::{MemoryCacheConfig, WorkerConfig};
    use analyzer_core::traits::{StorageProvider, WorkQueue};
    use analyzer_core::types::{DocumentId, JobId, UserId};
    use analyzer_database::{DocumentStore, JobStore};
    use analyzer_database::memory::{MemoryDocumentStore, MemoryJobStore};
    use analyzer_entity::document::NewDocument;
    use analyzer_entity::job::{JobStatus, NewJob};
    use analyzer_queue::MemoryWorkQueue;
    use analyzer_storage::MemoryStorageProvider;
    use bytes::Bytes;

    use super::*;
    use crate::executor::PipelineExecutor;

    async fn setup(jobs_count: usize) -> (WorkerRunner, Arc<MemoryJobStore>, Vec<JobId>) {
        let jobs = Arc::new(MemoryJobStore::new());
        let documents = Arc::new(MemoryDocumentStore::new());
        let blobs = Arc::new(MemoryStorageProvider::new());
        let queue = Arc::new(MemoryWorkQueue::new());

        let owner = UserId::new();
        let document_id = DocumentId::new();
        let path = format!("documents/{owner}/{document_id}");
        documents
            .create(NewDocument {
                id: document_id,
                owner_id: owner,
                filename: "q3.txt".into(),
                content_type: "text/plain".into(),
                size_bytes: 13,
                storage_path: path.clone(),
            })
            .await
            .unwrap();
        blobs.write(&path, Bytes::from_static(b"Revenue grew.")).await.unwrap();

        let mut ids = Vec::new();
        for _ in 0..jobs_count {
            let job = jobs
                .create(NewJob {
                    user_id: owner,
                    document_id,
                    query: "revenue".into(),
                    max_attempts: 3,
                })
                .await
                .unwrap();
            queue.enqueue(job.id).await.unwrap();
            ids.push(job.id);
        }

        let config = WorkerConfig {
            poll_interval_ms: 10,
            ..WorkerConfig::default()
        };
        let cache = ReadThroughCache::with_ttls(
            Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig { max_capacity: 10 })),
            Duration::from_secs(60),
            Duration::from_secs(3600),
        );
        let processor = JobProcessor::new(
            jobs.clone(),
            documents,
            blobs,
            queue,
            CacheInvalidator::new(cache),
            PipelineExecutor::from_config(&config).unwrap(),
            config,
            WorkerRunner::generate_worker_id(),
        );
        (WorkerRunner::new(processor), jobs, ids)
    }

    #[tokio::test]
    async fn test_drain_processes_in_order() {
        let (runner, _jobs, _ids) = setup(3).await;
        let outcomes = runner.drain().await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| matches!(o, ProcessOutcome::Completed(_))));
    }

    #[tokio::test]
    async fn test_run_completes_jobs_and_stops() {
        let (runner, jobs, ids) = setup(4).await;
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run(rx).await }
        });

        let deadline = time::Instant::now() + Duration::from_secs(10);
        loop {
            let mut done = 0;
            for id in &ids {
                if jobs.find_by_id(*id).await.unwrap().unwrap().status == JobStatus::Completed {
                    done += 1;
                }
            }
            if done == ids.len() {
                break;
            }
            assert!(time::Instant::now() < deadline, "jobs did not complete");
            time::sleep(Duration::from_millis(20)).await;
        }

        tx.send(true).unwrap();
        time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }

    #[test]
    fn test_worker_ids_are_unique() {
        assert_ne!(WorkerRunner::generate_worker_id(), WorkerRunner::generate_worker_id());
        assert!(WorkerRunner::generate_worker_id().starts_with("worker-"));
    }
}
