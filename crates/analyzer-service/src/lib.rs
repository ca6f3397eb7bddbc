//! # analyzer-service
//!
//! Business logic service layer for the document analyzer. Each service
//! orchestrates the stores, the work queue, the blob store and the cache
//! to implement one application-level use case.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod analysis;
pub mod context;
pub mod document;
pub mod job;

pub use analysis::AnalysisService;
pub use context::RequestContext;
pub use document::{DocumentService, UploadDocument};
pub use job::{JobDispatcher, JobHandle, JobStatusSource, StatusPoller};
