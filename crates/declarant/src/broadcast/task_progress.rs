//! Task progress broadcaster for real-time status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::db::TaskStatus;

/// Completion percentage rounded to one decimal; 0.0 while the total is
/// unknown.
pub fn percent(current: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = (current as f64 / total as f64) * 100.0;
    (raw * 10.0).round() / 10.0
}

/// Progress event for a processing task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgressEvent {
    /// Task identifier.
    pub task_id: String,
    /// Original filename being processed.
    pub file_name: String,
    /// Task status at the time of the event.
    pub status: TaskStatus,
    /// Rows processed so far.
    pub current: u32,
    /// Total rows in the file (0 until ingestion counts them).
    pub total: u32,
    /// Completion percentage, one decimal.
    pub percent: f64,
    /// Human-readable message describing current activity.
    pub message: String,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Timestamp of this event.
    pub timestamp: DateTime<Utc>,
}

impl TaskProgressEvent {
    fn new(
        task_id: &str,
        file_name: &str,
        status: TaskStatus,
        current: u32,
        total: u32,
        message: &str,
    ) -> Self {
        Self {
            task_id: task_id.to_string(),
            file_name: file_name.to_string(),
            status,
            current,
            total,
            percent: percent(current, total),
            message: message.to_string(),
            error: None,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcasts task progress events for streaming.
#[derive(Clone)]
pub struct TaskProgressBroadcaster {
    sender: Arc<broadcast::Sender<TaskProgressEvent>>,
}

impl TaskProgressBroadcaster {
    /// Creates a broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: TaskProgressEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber for progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for one task and announces it as queued.
    pub fn start_task(&self, task_id: &str, file_name: &str) -> TaskProgressTracker {
        let tracker = TaskProgressTracker::new(task_id, file_name, Arc::clone(&self.sender));
        tracker.queued();
        tracker
    }

    /// Gets the inner sender for creating trackers.
    pub fn sender(&self) -> Arc<broadcast::Sender<TaskProgressEvent>> {
        Arc::clone(&self.sender)
    }
}

impl Default for TaskProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Tracks progress for a single task.
pub struct TaskProgressTracker {
    task_id: String,
    file_name: String,
    sender: Arc<broadcast::Sender<TaskProgressEvent>>,
}

impl TaskProgressTracker {
    pub fn new(
        task_id: &str,
        file_name: &str,
        sender: Arc<broadcast::Sender<TaskProgressEvent>>,
    ) -> Self {
        Self {
            task_id: task_id.to_string(),
            file_name: file_name.to_string(),
            sender,
        }
    }

    fn send(&self, event: TaskProgressEvent) {
        let _ = self.sender.send(event);
    }

    /// Announces the task as waiting for a worker.
    pub fn queued(&self) {
        self.send(TaskProgressEvent::new(
            &self.task_id,
            &self.file_name,
            TaskStatus::Pending,
            0,
            0,
            "Task queued for processing",
        ));
    }

    /// Reports one processed row.
    pub fn row(&self, current: u32, total: u32, message: &str) {
        self.send(TaskProgressEvent::new(
            &self.task_id,
            &self.file_name,
            TaskStatus::Processing,
            current,
            total,
            message,
        ));
    }

    /// Marks the task as completed.
    pub fn completed(&self, total: u32) {
        self.send(TaskProgressEvent::new(
            &self.task_id,
            &self.file_name,
            TaskStatus::Completed,
            total,
            total,
            "Processing completed successfully",
        ));
    }

    /// Marks the task as cancelled mid-run.
    pub fn cancelled(&self, current: u32, total: u32) {
        self.send(TaskProgressEvent::new(
            &self.task_id,
            &self.file_name,
            TaskStatus::Cancelled,
            current,
            total,
            "Processing cancelled",
        ));
    }

    /// Marks the task as failed.
    pub fn failed(&self, error: &str) {
        let mut event = TaskProgressEvent::new(
            &self.task_id,
            &self.file_name,
            TaskStatus::Failed,
            0,
            0,
            "Processing failed",
        );
        event.error = Some(error.to_string());
        self.send(event);
    }
}
