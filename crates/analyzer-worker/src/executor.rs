//! Step executor: runs one pipeline step with a timeout and bounded retries.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use analyzer_core::config::WorkerConfig;
use analyzer_core::result::AppResult;

use crate::pipeline::{AnalysisStep, StepError, StepInput, StepRegistry};

/// A step that gave up.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Step '{step}' failed after {attempts} attempt(s): {error}")]
pub struct StepFailure {
    /// Step name.
    pub step: String,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// The last error.
    pub error: StepError,
}

/// Runs the configured steps.
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    /// Steps in execution order.
    registry: StepRegistry,
    /// Limit for a single attempt.
    step_timeout: Duration,
    /// Retries after a transient failure.
    max_retries: u32,
    /// Delay before the first retry; doubled for each further one.
    retry_backoff: Duration,
}

impl PipelineExecutor {
    /// Create an executor over an explicit registry.
    pub fn new(
        registry: StepRegistry,
        step_timeout: Duration,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            registry,
            step_timeout,
            max_retries,
            retry_backoff,
        }
    }

    /// Resolve steps and limits from configuration.
    pub fn from_config(config: &WorkerConfig) -> AppResult<Self> {
        Ok(Self::new(
            StepRegistry::from_config(config)?,
            config.step_timeout(),
            config.max_step_retries,
            Duration::from_millis(config.retry_backoff_ms),
        ))
    }

    /// The steps in execution order.
    pub fn steps(&self) -> &[Arc<dyn AnalysisStep>] {
        self.registry.steps()
    }

    /// Run one step, retrying transient failures and timeouts.
    pub async fn run_step(
        &self,
        step: &dyn AnalysisStep,
        input: &StepInput<'_>,
    ) -> Result<String, StepFailure> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match timeout(self.step_timeout, step.run(input)).await {
                Ok(Ok(output)) => {
                    debug!(step = step.name(), attempt, bytes = output.len(), "Step finished");
                    return Ok(output);
                }
                Ok(Err(e)) => e,
                Err(_) => StepError::Transient(format!(
                    "timed out after {}s",
                    self.step_timeout.as_secs_f64()
                )),
            };

            if !error.is_transient() || attempt > self.max_retries {
                return Err(StepFailure {
                    step: step.name().to_string(),
                    attempts: attempt,
                    error,
                });
            }

            let delay = self.retry_backoff.saturating_mul(1 << (attempt - 1).min(16));
            warn!(
                step = step.name(),
                attempt,
                error = %error,
                retry_in_ms = delay.as_millis() as u64,
                "Step failed, retrying"
            );
            sleep(delay).await;
        }
    }
}
