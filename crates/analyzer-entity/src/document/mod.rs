//! Uploaded document entities.

pub mod model;

pub use model::{Document, NewDocument};
