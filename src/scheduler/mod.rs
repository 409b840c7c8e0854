//! Cooperative job scheduler.
//!
//! Search work is cut into small jobs that never block a worker thread:
//! instead of waiting, a job returns a [`JobControl`] telling the scheduler
//! to requeue it, suspend it on spawned children, or park it on a
//! [`JobQueue`] whose current executor will wake it. A fixed pool of workers
//! drains the ready queue until no job is live or a job fails, in which case
//! the first error aborts the phase.

mod job;
mod job_queue;
#[allow(clippy::module_inception)]
mod scheduler;

pub use job::*;
pub use job_queue::*;
pub use scheduler::*;
