//! Job admission and status observation.

pub mod dispatcher;
pub mod poller;

pub use dispatcher::{JobDispatcher, JobHandle};
pub use poller::{JobStatusSource, PollUpdate, ProgressTracker, StatusPoller, normalize_progress};
