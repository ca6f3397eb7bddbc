//! Client side of the status polling protocol.
//!
//! A client polls a job until it is `completed` or `failed`. Progress is
//! displayed as a percentage: stored values are fractions, but older
//! producers reported percentages, so values above 1 are taken as already
//! scaled. The displayed value never moves backwards.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};
use tracing::debug;

use analyzer_core::error::AppError;
use analyzer_core::result::AppResult;
use analyzer_core::types::JobId;
use analyzer_entity::job::JobSnapshot;

/// Anything that can report a job's current snapshot.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    /// Fetch the job's current snapshot.
    async fn fetch_status(&self, job_id: JobId) -> AppResult<JobSnapshot>;
}

/// Convert a reported progress value to a percentage in `[0, 100]`.
pub fn normalize_progress(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    let percent = if value <= 1.0 { value * 100.0 } else { value };
    percent.min(100.0)
}

/// Keeps the displayed percentage monotonic across polls.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressTracker {
    shown: f64,
}

impl ProgressTracker {
    /// Record a reported value; returns the percentage to display.
    pub fn observe(&mut self, reported: f64) -> f64 {
        self.shown = self.shown.max(normalize_progress(reported));
        self.shown
    }

    /// The last displayed percentage.
    pub fn shown(&self) -> f64 {
        self.shown
    }
}

/// One observation handed to the caller's callback.
#[derive(Debug, Clone)]
pub struct PollUpdate {
    /// The snapshot as returned by the source.
    pub snapshot: JobSnapshot,
    /// Monotonic percentage for display.
    pub percent: f64,
}

/// Polls with exponential backoff.
///
/// The interval starts at `initial`, grows by `multiplier` after each poll
/// that shows no change, and is capped at `max`. Any visible change resets
/// it, so an active job is observed promptly and an idle one is not hammered.
#[derive(Debug, Clone)]
pub struct StatusPoller {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    deadline: Option<Duration>,
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(10),
            multiplier: 2.0,
            deadline: None,
        }
    }
}

impl StatusPoller {
    /// Create a poller with the given interval bounds.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            ..Self::default()
        }
    }

    /// Set the backoff multiplier (values below 1 are treated as 1).
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Give up after `deadline` without a terminal status.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Poll until the job is terminal and return its final snapshot.
    pub async fn wait_for_terminal<S, F>(
        &self,
        source: &S,
        job_id: JobId,
        mut on_update: F,
    ) -> AppResult<JobSnapshot>
    where
        S: JobStatusSource + ?Sized,
        F: FnMut(&PollUpdate) + Send,
    {
        let started = Instant::now();
        let mut tracker = ProgressTracker::default();
        let mut interval = self.initial;
        let mut last: Option<JobSnapshot> = None;

        loop {
            let snapshot = source.fetch_status(job_id).await?;
            let changed = last.as_ref().is_none_or(|prev| {
                prev.status != snapshot.status || prev.progress != snapshot.progress
            });
            let percent = tracker.observe(snapshot.progress);

            if changed {
                on_update(&PollUpdate {
                    snapshot: snapshot.clone(),
                    percent,
                });
                interval = self.initial;
            } else {
                interval = self.next_interval(interval);
            }

            if snapshot.status.is_terminal() {
                return Ok(snapshot);
            }

            if let Some(deadline) = self.deadline {
                if started.elapsed() + interval > deadline {
                    return Err(AppError::service_unavailable(format!(
                        "Job {job_id} did not finish within {}s",
                        deadline.as_secs()
                    )));
                }
            }

            debug!(job_id = %job_id, status = %snapshot.status, wait_ms = interval.as_millis() as u64, "Polling again");
            last = Some(snapshot);
            sleep(interval).await;
        }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max)
    }
}
