//! The ordered analysis steps a job runs through.

pub mod registry;
pub mod steps;

use std::borrow::Cow;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use analyzer_entity::document::Document;

pub use registry::StepRegistry;

/// Name of the step whose output later steps treat as the document text.
pub const EXTRACT_STEP: &str = "extract";

/// Everything a step may look at.
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    /// The document record.
    pub document: &'a Document,
    /// Raw blob contents.
    pub content: &'a Bytes,
    /// The job's query.
    pub query: &'a str,
    /// Outputs of the steps that ran before this one, in order.
    pub previous: &'a [StepOutput],
}

impl StepInput<'_> {
    /// Document text: the extract step's output when present, otherwise
    /// the blob decoded as UTF-8 with invalid sequences replaced.
    pub fn text(&self) -> Cow<'_, str> {
        match self.output_of(EXTRACT_STEP) {
            Some(text) => Cow::Borrowed(text),
            None => String::from_utf8_lossy(self.content),
        }
    }

    /// Output of an earlier step by name.
    pub fn output_of(&self, step: &str) -> Option<&str> {
        self.previous
            .iter()
            .rev()
            .find(|o| o.step == step)
            .map(|o| o.output.as_str())
    }
}

/// What one step produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    /// Step name.
    pub step: String,
    /// Produced text.
    pub output: String,
}

/// Why a step did not produce output.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StepError {
    /// May succeed if tried again.
    #[error("{0}")]
    Transient(String),

    /// Will fail the same way every time.
    #[error("{0}")]
    Permanent(String),
}

impl StepError {
    /// Whether retrying may help.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// One stage of the analysis pipeline.
#[async_trait]
pub trait AnalysisStep: Send + Sync + std::fmt::Debug {
    /// Name used in configuration and in failure messages.
    fn name(&self) -> &str;

    /// Run the step.
    async fn run(&self, input: &StepInput<'_>) -> Result<String, StepError>;
}
