//! Background worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Analysis worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the server process also runs a worker.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of jobs processed concurrently by one worker process.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Delay in milliseconds between dequeue attempts on an empty queue.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Lease length in seconds. Renewed by heartbeats while a job runs.
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl_seconds: u64,
    /// Wall-clock budget for one pipeline run.
    #[serde(default = "default_max_wall_clock")]
    pub max_wall_clock_seconds: u64,
    /// Timeout applied to each step attempt.
    #[serde(default = "default_step_timeout")]
    pub step_timeout_seconds: u64,
    /// Retries allowed per step after a transient failure.
    #[serde(default = "default_max_step_retries")]
    pub max_step_retries: u32,
    /// Base delay between step retries, doubled on each retry.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// Claims allowed per job before it is failed instead of reclaimed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    /// Interval in seconds between expired-lease sweeps.
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_seconds: u64,
    /// Ordered names of the analysis steps.
    #[serde(default = "default_steps")]
    pub steps: Vec<String>,
    /// Settings for the remote `http` step.
    #[serde(default)]
    pub http_step: HttpStepConfig,
}

impl WorkerConfig {
    /// Lease length as a [`Duration`].
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_seconds)
    }

    /// Heartbeat period: a third of the lease, so two missed beats are tolerated.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.lease_ttl_seconds * 1000 / 3)
    }

    /// Wall-clock budget as a [`Duration`].
    pub fn max_wall_clock(&self) -> Duration {
        Duration::from_secs(self.max_wall_clock_seconds)
    }

    /// Per-step timeout as a [`Duration`].
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval(),
            lease_ttl_seconds: default_lease_ttl(),
            max_wall_clock_seconds: default_max_wall_clock(),
            step_timeout_seconds: default_step_timeout(),
            max_step_retries: default_max_step_retries(),
            retry_backoff_ms: default_retry_backoff(),
            max_attempts: default_max_attempts(),
            reaper_interval_seconds: default_reaper_interval(),
            steps: default_steps(),
            http_step: HttpStepConfig::default(),
        }
    }
}

/// Remote analysis endpoint used by the `http` step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpStepConfig {
    /// Endpoint receiving `POST {document, query, previous}`.
    #[serde(default)]
    pub url: Option<String>,
    /// Optional bearer token sent to the endpoint.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    2
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_lease_ttl() -> u64 {
    60
}

fn default_max_wall_clock() -> u64 {
    900
}

fn default_step_timeout() -> u64 {
    300
}

fn default_max_step_retries() -> u32 {
    2
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_max_attempts() -> i32 {
    3
}

fn default_reaper_interval() -> u64 {
    15
}

fn default_steps() -> Vec<String> {
    vec![
        "extract".to_string(),
        "indicators".to_string(),
        "summarize".to_string(),
    ]
}
