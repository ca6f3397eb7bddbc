//! Progress milestones reported while a job runs.

/// Progress written when a worker claims the job.
pub const CLAIMED: f64 = 0.05;

/// Highest progress reported before the result is persisted.
pub const CEILING: f64 = 0.95;

/// Progress written on completion.
pub const DONE: f64 = 1.0;

/// Progress after finishing step `index` (zero-based) of `total` steps.
pub fn after_step(index: usize, total: usize) -> f64 {
    if total == 0 {
        return CEILING;
    }
    let fraction = (index + 1) as f64 / total as f64;
    fraction.clamp(CLAIMED, CEILING)
}
