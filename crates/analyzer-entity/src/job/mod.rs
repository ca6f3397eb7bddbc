//! Analysis job domain entities.

pub mod lease;
pub mod model;
pub mod progress;
pub mod status;

pub use lease::JobLease;
pub use model::{Job, JobSnapshot, NewJob};
pub use status::JobStatus;
