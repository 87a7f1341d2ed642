//! Task lifecycle surface: submission, status, cancellation, and
//! maintenance.

use chrono::{Duration, NaiveDate, SecondsFormat, Utc};
use log::info;
use serde::Serialize;
use thiserror::Error;

use crate::db::task_repo::{self, DaySummary, TaskRow};
use crate::db::{Database, DatabaseError, TaskStatus};
use crate::error::StorageError;
use crate::ingest::{validate, ValidationReport};
use crate::storage::UploadStore;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Upload rejected: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task {id} is already {status}")]
    AlreadyTerminal { id: String, status: TaskStatus },

    #[error("Task {0} has not completed yet")]
    NotCompleted(String),

    #[error("Export format {0:?} is not available yet")]
    ExportUnavailable(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Status snapshot returned to polling clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusView {
    pub id: String,
    pub status: TaskStatus,
    pub total_items: u32,
    pub processed_items: u32,
    pub progress_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Validates and stores an upload, then creates the pending task.
/// Validation errors reject the upload before anything is written;
/// warnings travel back with the created task.
pub fn submit(
    db: &Database,
    store: &UploadStore,
    user_id: &str,
    file_name: &str,
    payload: &[u8],
) -> Result<(TaskRow, ValidationReport), TaskError> {
    let report = validate(file_name, payload);
    if !report.valid {
        return Err(TaskError::Validation(report.errors.clone()));
    }

    let path = store.store(user_id, file_name, payload)?;
    let task = TaskRow::new(user_id, file_name, &path.to_string_lossy());
    task_repo::insert(db, &task)?;

    info!(
        "Task {} created for {} ({} rows, {:.2} MB)",
        task.id, file_name, report.rows, report.size_mb
    );
    Ok((task, report))
}

/// Current status of a task.
pub fn status(db: &Database, task_id: &str) -> Result<TaskStatusView, TaskError> {
    let task = task_repo::find_by_id(db, task_id)?
        .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

    Ok(TaskStatusView {
        id: task.id.clone(),
        status: task.status,
        total_items: task.total_items,
        processed_items: task.processed_items,
        progress_percent: task.progress_percent(),
        error_message: task.error,
    })
}

/// Requests cancellation. The flag flips immediately; an in-flight run
/// notices at its next per-row check.
pub fn cancel(db: &Database, task_id: &str) -> Result<(), TaskError> {
    let task = task_repo::find_by_id(db, task_id)?
        .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

    if !task_repo::mark_cancelled(db, task_id)? {
        return Err(TaskError::AlreadyTerminal {
            id: task_id.to_string(),
            status: task.status,
        });
    }

    info!("Task {} cancelled", task_id);
    Ok(())
}

/// A user's tasks, newest first, with the unpaged total.
pub fn list_for_user(
    db: &Database,
    user_id: &str,
    limit: u64,
    offset: u64,
) -> Result<(Vec<TaskRow>, u64), TaskError> {
    Ok(task_repo::query_by_user(db, user_id, limit, offset)?)
}

/// Deletes terminal tasks older than `max_age_days`, items included.
/// Returns how many tasks were removed.
pub fn cleanup_old_tasks(db: &Database, max_age_days: i64) -> Result<u64, TaskError> {
    let cutoff = (Utc::now() - Duration::days(max_age_days))
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    let deleted = task_repo::delete_terminal_older_than(db, &cutoff)?;
    info!("Removed {} old tasks", deleted);
    Ok(deleted)
}

/// Task statistics for one day: created, completed, failed counts.
pub fn daily_summary(db: &Database, date: NaiveDate) -> Result<DaySummary, TaskError> {
    Ok(task_repo::day_summary(
        db,
        &date.format("%Y-%m-%d").to_string(),
    )?)
}

/// Exports a completed task's items. No export backend is wired up yet,
/// so this always reports the format as unavailable after the task
/// checks pass.
pub fn export(db: &Database, task_id: &str, format: &str) -> Result<Vec<u8>, TaskError> {
    let task = task_repo::find_by_id(db, task_id)?
        .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

    if task.status != TaskStatus::Completed {
        return Err(TaskError::NotCompleted(task_id.to_string()));
    }

    Err(TaskError::ExportUnavailable(format.to_string()))
}
