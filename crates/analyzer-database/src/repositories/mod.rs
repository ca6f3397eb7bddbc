//! PostgreSQL repository implementations.

pub mod analysis;
pub mod document;
pub mod job;

pub use analysis::AnalysisRepository;
pub use document::DocumentRepository;
pub use job::JobRepository;
