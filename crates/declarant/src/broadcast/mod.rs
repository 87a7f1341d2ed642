//! Real-time event streaming to interested subscribers.

pub mod task_progress;

pub use task_progress::{
    percent, TaskProgressBroadcaster, TaskProgressEvent, TaskProgressTracker,
};
