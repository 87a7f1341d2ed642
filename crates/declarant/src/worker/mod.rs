//! Background processing: job descriptors and the worker pool that
//! drains the task queue.

pub mod job;
pub mod pool;

pub use job::{Job, JobResult};
pub use pool::{RetryPolicy, WorkerPool};
