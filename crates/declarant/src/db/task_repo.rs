//! Task repository — CRUD operations for the `tasks` table.
//!
//! Status transitions that the pipeline performs are guarded so that a
//! terminal task (completed, failed, cancelled) is never mutated again.

use rusqlite::{params, OptionalExtension, Row};

use super::status::TaskStatus;
use super::{now_rfc3339, Database, DatabaseError};

/// One uploaded file's processing run.
#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub user_id: String,
    pub file_name: String,
    pub file_path: String,
    pub status: TaskStatus,
    pub total_items: u32,
    pub processed_items: u32,
    /// Handle of the async job processing this task, if dispatched.
    pub job_id: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRow {
    /// Builds a fresh pending task for an uploaded file.
    pub fn new(user_id: &str, file_name: &str, file_path: &str) -> Self {
        let now = now_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            status: TaskStatus::Pending,
            total_items: 0,
            processed_items: 0,
            job_id: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            file_name: row.get("file_name")?,
            file_path: row.get("file_path")?,
            status: row.get("status")?,
            total_items: row.get("total_items")?,
            processed_items: row.get("processed_items")?,
            job_id: row.get("job_id")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Completion percentage rounded to one decimal; 0.0 until the row
    /// count is known.
    pub fn progress_percent(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        let raw = (self.processed_items as f64 / self.total_items as f64) * 100.0;
        (raw * 10.0).round() / 10.0
    }
}

/// Inserts a new task row.
pub fn insert(db: &Database, task: &TaskRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO tasks (id, user_id, file_name, file_path, status, total_items,
             processed_items, job_id, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                task.id,
                task.user_id,
                task.file_name,
                task.file_path,
                task.status,
                task.total_items,
                task.processed_items,
                task.job_id,
                task.error,
                task.created_at,
                task.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a task by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<TaskRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM tasks WHERE id = ?1",
                params![id],
                TaskRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Marks a task `processing` and records the job handle.
/// Leaves terminal tasks untouched; returns whether the row changed.
pub fn set_processing(db: &Database, id: &str, job_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE tasks SET status = 'processing', job_id = ?2, updated_at = ?3
             WHERE id = ?1 AND status NOT IN ('completed', 'failed', 'cancelled')",
            params![id, job_id, now_rfc3339()],
        )?;
        Ok(changed > 0)
    })
}

/// Records the row count once ingestion has determined it.
pub fn set_total_items(db: &Database, id: &str, total: u32) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE tasks SET total_items = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, total, now_rfc3339()],
        )?;
        Ok(())
    })
}

/// Atomically bumps the processed counter by one and returns the new value.
pub fn increment_processed(db: &Database, id: &str) -> Result<u32, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE tasks SET processed_items = processed_items + 1, updated_at = ?2
             WHERE id = ?1",
            params![id, now_rfc3339()],
        )?;
        let value: u32 = conn.query_row(
            "SELECT processed_items FROM tasks WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        Ok(value)
    })
}

/// Marks a non-terminal task `completed`.
pub fn mark_completed(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE tasks SET status = 'completed', updated_at = ?2
             WHERE id = ?1 AND status NOT IN ('completed', 'failed', 'cancelled')",
            params![id, now_rfc3339()],
        )?;
        Ok(changed > 0)
    })
}

/// Marks a non-terminal task `failed` and stores the error message.
pub fn mark_failed(db: &Database, id: &str, error: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE tasks SET status = 'failed', error = ?2, updated_at = ?3
             WHERE id = ?1 AND status NOT IN ('completed', 'failed', 'cancelled')",
            params![id, error, now_rfc3339()],
        )?;
        Ok(changed > 0)
    })
}

/// Resets a failed task back to `pending` for a retry attempt and clears
/// its counters and error, so the next run starts from a clean slate.
pub fn reset_for_retry(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE tasks SET status = 'pending', error = NULL, total_items = 0,
             processed_items = 0, updated_at = ?2
             WHERE id = ?1 AND status = 'failed'",
            params![id, now_rfc3339()],
        )?;
        Ok(changed > 0)
    })
}

/// Marks a non-terminal task `cancelled`. Returns false when the task was
/// already terminal, which the caller reports as an error.
pub fn mark_cancelled(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE tasks SET status = 'cancelled', updated_at = ?2
             WHERE id = ?1 AND status NOT IN ('completed', 'failed', 'cancelled')",
            params![id, now_rfc3339()],
        )?;
        Ok(changed > 0)
    })
}

/// Lists a user's tasks, newest first, returning (rows, total_count).
pub fn query_by_user(
    db: &Database,
    user_id: &str,
    limit: u64,
    offset: u64,
) -> Result<(Vec<TaskRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let total: u64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT * FROM tasks WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let rows: Vec<TaskRow> = stmt
            .query_map(params![user_id, limit as i64, offset as i64], TaskRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Counts tasks with the given status.
pub fn count_by_status(db: &Database, status: TaskStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Deletes terminal tasks created before the cutoff timestamp. Items go
/// with them via the cascade. Returns the number of tasks removed.
pub fn delete_terminal_older_than(db: &Database, cutoff: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute(
            "DELETE FROM tasks
             WHERE created_at < ?1 AND status IN ('completed', 'failed', 'cancelled')",
            params![cutoff],
        )?;
        Ok(deleted as u64)
    })
}

/// Per-day task statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub created: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Counts tasks created on the given day (`YYYY-MM-DD`), split by outcome.
pub fn day_summary(db: &Database, date: &str) -> Result<DaySummary, DatabaseError> {
    let pattern = format!("{}%", date);
    db.with_conn(|conn| {
        let created: u64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE created_at LIKE ?1",
            params![pattern],
            |r| r.get(0),
        )?;
        let completed: u64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE created_at LIKE ?1 AND status = 'completed'",
            params![pattern],
            |r| r.get(0),
        )?;
        let failed: u64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE created_at LIKE ?1 AND status = 'failed'",
            params![pattern],
            |r| r.get(0),
        )?;
        Ok(DaySummary {
            created,
            completed,
            failed,
        })
    })
}
