//! Analysis workers for the document analyzer.
//!
//! This crate provides:
//! - The analysis step pipeline and its built-in steps
//! - The job processor: claim, run, report progress, finalize
//! - A worker runner that pulls deliveries from the work queue
//! - A lease reaper that returns abandoned deliveries to the queue

pub mod executor;
pub mod heartbeat;
pub mod pipeline;
pub mod processor;
pub mod reaper;
pub mod runner;

pub use executor::PipelineExecutor;
pub use pipeline::{AnalysisStep, StepError, StepInput, StepOutput, StepRegistry};
pub use processor::{JobProcessor, ProcessOutcome};
pub use reaper::LeaseReaper;
pub use runner::WorkerRunner;
