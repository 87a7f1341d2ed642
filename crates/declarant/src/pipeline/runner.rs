use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::classify::Classifier;
use crate::db::{item_repo, task_repo, Database, TaskStatus};
use crate::db::item_repo::ItemRow;
use crate::ingest::{self, ColumnMap, Table};
use crate::worker::job::Job;

use super::error::PipelineError;
use super::progress::{ProgressEvent, ProgressReporter};

/// Outcome of a completed (or cleanly stopped) pipeline run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub task_id: String,
    pub total_items: u32,
    pub processed_items: u32,
    pub cancelled: bool,
    pub message: String,
}

pub struct Pipeline {
    db: Database,
    classifier: Arc<dyn Classifier>,
}

impl Pipeline {
    pub fn new(db: Database, classifier: Arc<dyn Classifier>) -> Self {
        Self { db, classifier }
    }

    /// Runs the full pipeline for one task. On error the task is marked
    /// failed and the failure is broadcast; the caller decides whether
    /// to retry based on [`PipelineError::is_retryable`].
    pub fn run(
        &self,
        job: &Job,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary, PipelineError> {
        let _pipeline_span = info_span!("pipeline",
            job_id = %job.id,
            task_id = %job.task_id,
            attempt = job.attempt,
        )
        .entered();

        match self.execute(job, progress) {
            Ok(summary) => Ok(summary),
            Err(e) => {
                let message = e.to_string();
                match task_repo::mark_failed(&self.db, &job.task_id, &message) {
                    Ok(_) => {}
                    Err(db_err) => {
                        warn!("Failed to record task failure: {}", db_err);
                    }
                }
                progress.report(ProgressEvent::Failed {
                    error: message,
                });
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        job: &Job,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary, PipelineError> {
        let task = task_repo::find_by_id(&self.db, &job.task_id)?
            .ok_or_else(|| PipelineError::TaskNotFound(job.task_id.clone()))?;

        // A task cancelled while still queued never starts.
        if task.status.is_terminal() {
            debug!("Task {} already {}, skipping run", task.id, task.status);
            return Ok(RunSummary {
                task_id: task.id.clone(),
                total_items: task.total_items,
                processed_items: task.processed_items,
                cancelled: task.status == TaskStatus::Cancelled,
                message: format!("Task already {}", task.status),
            });
        }

        task_repo::set_processing(&self.db, &task.id, &job.id)?;

        // Items left over from an earlier attempt would collide on
        // (task_id, row_number); a retry starts from a clean slate.
        let removed = item_repo::delete_by_task(&self.db, &task.id)?;
        if removed > 0 {
            debug!("Removed {} items from previous attempt", removed);
        }

        info!("Processing file: {}", task.file_name);
        let table = {
            let _step = info_span!("ingest").entered();
            let (table, warnings) = ingest::read_table(Path::new(&task.file_path))?;
            for warning in &warnings {
                warn!("Ingest warning for {}: {}", task.file_name, warning);
            }
            table
        };

        let total = table.row_count() as u32;
        task_repo::set_total_items(&self.db, &task.id, total)?;

        let columns = ColumnMap::detect(&table.headers);
        let mut processed: u32 = 0;

        {
            let _step = info_span!("classify_rows", total).entered();
            for index in 0..table.row_count() {
                // The cancel surface only flips the status; the run
                // notices here, between rows.
                let current = task_repo::find_by_id(&self.db, &task.id)?
                    .ok_or_else(|| PipelineError::TaskNotFound(task.id.clone()))?;
                if current.status == TaskStatus::Cancelled {
                    info!(
                        "Task {} cancelled after {} of {} rows",
                        task.id, processed, total
                    );
                    progress.report(ProgressEvent::Cancelled {
                        current: processed,
                        total,
                    });
                    return Ok(RunSummary {
                        task_id: task.id.clone(),
                        total_items: total,
                        processed_items: processed,
                        cancelled: true,
                        message: "Processing cancelled".to_string(),
                    });
                }

                let row_number = (index + 1) as u32;
                let item = ItemRow::new(
                    &task.id,
                    row_number,
                    table.value(index, columns.name.unwrap_or(0)),
                    row_value(&table, index, columns.quantity),
                    row_value(&table, index, columns.unit),
                );
                item_repo::insert(&self.db, &item)?;

                let classification = self.classifier.classify(&item.original_description)?;
                item_repo::update_classification(&self.db, &item.id, &classification)?;

                processed = task_repo::increment_processed(&self.db, &task.id)?;
                progress.report(ProgressEvent::Row {
                    current: processed,
                    total,
                    message: format!("Обработано {} из {} позиций", processed, total),
                });
            }
        }

        task_repo::mark_completed(&self.db, &task.id)?;
        progress.report(ProgressEvent::Completed { total });
        info!("File {} processed successfully", task.file_name);

        Ok(RunSummary {
            task_id: task.id.clone(),
            total_items: total,
            processed_items: processed,
            cancelled: false,
            message: format!("Файл {} обработан успешно", task.file_name),
        })
    }
}

fn row_value<'t>(table: &'t Table, row: usize, column: Option<usize>) -> &'t str {
    column.map(|col| table.value(row, col)).unwrap_or("")
}
