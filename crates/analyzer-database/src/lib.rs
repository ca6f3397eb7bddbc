//! # analyzer-database
//!
//! The job record store and document store. Store traits live in
//! [`store`]; PostgreSQL implementations in [`repositories`] and
//! in-process implementations in [`memory`].

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::{DatabasePool, Stores};
pub use store::{AnalysisStore, ClaimOutcome, CompleteOutcome, DocumentStore, JobStore, WriteOutcome};
