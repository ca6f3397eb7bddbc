//! Uploaded document lifecycle.

pub mod service;

pub use service::{DocumentService, UploadDocument};
