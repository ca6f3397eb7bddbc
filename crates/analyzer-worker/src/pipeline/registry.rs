//! Resolves configured step names to step implementations.

use std::sync::Arc;

use tracing::info;

use analyzer_core::config::WorkerConfig;
use analyzer_core::error::AppError;
use analyzer_core::result::AppResult;

use super::AnalysisStep;
use super::steps::{ExtractStep, HttpStep, IndicatorsStep, SummarizeStep};

/// The ordered list of steps a worker runs for every job.
#[derive(Debug, Clone)]
pub struct StepRegistry {
    steps: Vec<Arc<dyn AnalysisStep>>,
}

impl StepRegistry {
    /// Build from an explicit list.
    pub fn new(steps: Vec<Arc<dyn AnalysisStep>>) -> Self {
        Self { steps }
    }

    /// Resolve `worker.steps` at start-up. Unknown names are an error.
    pub fn from_config(config: &WorkerConfig) -> AppResult<Self> {
        let mut steps: Vec<Arc<dyn AnalysisStep>> = Vec::with_capacity(config.steps.len());
        for name in &config.steps {
            let step: Arc<dyn AnalysisStep> = match name.as_str() {
                "extract" => Arc::new(ExtractStep),
                "indicators" => Arc::new(IndicatorsStep),
                "summarize" => Arc::new(SummarizeStep),
                "http" => Arc::new(HttpStep::new(&config.http_step, config.step_timeout())?),
                other => {
                    return Err(AppError::configuration(format!(
                        "Unknown analysis step '{other}'. Supported: extract, indicators, summarize, http"
                    )));
                }
            };
            steps.push(step);
        }
        if steps.is_empty() {
            return Err(AppError::configuration("At least one analysis step is required"));
        }
        info!(steps = ?config.steps, "Resolved analysis pipeline");
        Ok(Self { steps })
    }

    /// The steps in execution order.
    pub fn steps(&self) -> &[Arc<dyn AnalysisStep>] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
