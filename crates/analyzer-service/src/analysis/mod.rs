//! Read access to persisted analysis results.

pub mod service;

pub use service::AnalysisService;
