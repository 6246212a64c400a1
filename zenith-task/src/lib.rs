//! Job system with named worker threads.
//!
//! There is no process-wide scheduler, owners create a [`JobSystem`] and hand it out explicitly.

mod job;
mod system;
mod worker;

pub use job::{AsJobState, Job, JobHandle, JobId, JobResult, JobState, PendingJob};
pub use system::JobSystem;
