use std::sync::Arc;

use tokio::sync::broadcast;

use crate::broadcast::task_progress::{TaskProgressEvent, TaskProgressTracker};

/// Events emitted by the pipeline during a run.
pub enum ProgressEvent {
    Row {
        current: u32,
        total: u32,
        message: String,
    },
    Completed {
        total: u32,
    },
    Cancelled {
        current: u32,
        total: u32,
    },
    Failed {
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges pipeline events into the broadcast channel.
pub struct BroadcastProgress {
    tracker: TaskProgressTracker,
}

impl BroadcastProgress {
    pub fn new(
        task_id: &str,
        file_name: &str,
        sender: Arc<broadcast::Sender<TaskProgressEvent>>,
    ) -> Self {
        Self {
            tracker: TaskProgressTracker::new(task_id, file_name, sender),
        }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Row {
                current,
                total,
                message,
            } => self.tracker.row(current, total, &message),
            ProgressEvent::Completed { total } => self.tracker.completed(total),
            ProgressEvent::Cancelled { current, total } => self.tracker.cancelled(current, total),
            ProgressEvent::Failed { error } => self.tracker.failed(&error),
        }
    }
}
