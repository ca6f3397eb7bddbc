//! # analyzer-api
//!
//! HTTP API layer for the document analyzer built on Axum.
//!
//! Provides the job, document, analysis and health endpoints, middleware
//! (request logging, rate limiting, CORS), extractors, DTOs and error
//! mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{Backends, build_app, build_state, build_worker, run_server};
pub use state::AppState;
