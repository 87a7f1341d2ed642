use crate::pipeline::RunSummary;

/// One attempt at processing a task.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub task_id: String,
    /// 1-based attempt counter.
    pub attempt: u32,
}

impl Job {
    /// Creates the initial job for a task.
    pub fn first_attempt(task_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            attempt: 1,
        }
    }

    /// Creates the follow-up job after a retryable failure. The job id
    /// is fresh; the task id carries over.
    pub fn retry(&self) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: self.task_id.clone(),
            attempt: self.attempt + 1,
        }
    }
}

/// Final outcome of a task, emitted once per task regardless of how
/// many attempts it took.
#[derive(Debug)]
pub struct JobResult {
    pub job_id: String,
    pub task_id: String,
    pub attempt: u32,
    pub success: bool,
    pub summary: Option<RunSummary>,
    pub error: Option<String>,
}

impl JobResult {
    pub fn success(job: &Job, summary: RunSummary) -> Self {
        Self {
            job_id: job.id.clone(),
            task_id: job.task_id.clone(),
            attempt: job.attempt,
            success: true,
            summary: Some(summary),
            error: None,
        }
    }

    pub fn failure(job: &Job, error: String) -> Self {
        Self {
            job_id: job.id.clone(),
            task_id: job.task_id.clone(),
            attempt: job.attempt,
            success: false,
            summary: None,
            error: Some(error),
        }
    }
}
