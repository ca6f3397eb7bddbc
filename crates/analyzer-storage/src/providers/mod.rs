//! Storage provider implementations.

pub mod local;
#[cfg(feature = "memory")]
pub mod memory;

pub use local::LocalStorageProvider;
#[cfg(feature = "memory")]
pub use memory::MemoryStorageProvider;
