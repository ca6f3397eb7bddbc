//! Persisted analysis results.

pub mod model;

pub use model::{AnalysisFilter, AnalysisResult, NewAnalysisResult};
