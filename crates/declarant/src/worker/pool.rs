use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, warn};
use tokio::sync::broadcast;

use crate::broadcast::task_progress::TaskProgressEvent;
use crate::classify::Classifier;
use crate::db::{task_repo, Database};
use crate::pipeline::progress::{BroadcastProgress, NoopProgress};
use crate::pipeline::Pipeline;
use crate::worker::job::{Job, JobResult};

/// Retry behavior for transient pipeline failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per task, including the first.
    pub max_attempts: u32,
    /// Pause before a re-enqueued attempt.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(60),
        }
    }
}

pub struct WorkerPool {
    job_sender: Sender<Job>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    /// Kept to hold the channel open for late subscribers; workers use
    /// cloned Arcs.
    #[allow(dead_code)]
    progress_sender: Option<Arc<broadcast::Sender<TaskProgressEvent>>>,
}

impl WorkerPool {
    pub fn new(
        db: Database,
        classifier: Arc<dyn Classifier>,
        worker_count: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self::with_progress_sender(db, classifier, worker_count, retry, None)
    }

    /// Creates a worker pool with an optional progress broadcaster.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn with_progress_sender(
        db: Database,
        classifier: Arc<dyn Classifier>,
        worker_count: usize,
        retry: RetryPolicy,
        progress_sender: Option<Arc<broadcast::Sender<TaskProgressEvent>>>,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (job_sender, job_receiver) = bounded::<Job>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<JobResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let job_tx = job_sender.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_db = db.clone();
            let worker_classifier = Arc::clone(&classifier);
            let worker_progress = progress_sender.clone();

            let handle = thread::spawn(move || {
                run_worker(
                    worker_id,
                    job_rx,
                    job_tx,
                    result_tx,
                    shutdown_flag,
                    worker_db,
                    worker_classifier,
                    retry,
                    worker_progress,
                );
            });

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
            progress_sender,
        }
    }

    pub fn submit(&self, job: Job) -> Result<(), crate::error::WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(crate::error::WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| crate::error::WorkerError::ChannelClosed)
    }

    pub fn try_recv_result(&self) -> Option<JobResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<Job>,
    job_sender: Sender<Job>,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    db: Database,
    classifier: Arc<dyn Classifier>,
    retry: RetryPolicy,
    progress_sender: Option<Arc<broadcast::Sender<TaskProgressEvent>>>,
) {
    debug!("Worker {} started", worker_id);

    let pipeline = Pipeline::new(db.clone(), classifier);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => {
                debug!(
                    "Worker {} processing task {} (attempt {})",
                    worker_id, job.task_id, job.attempt
                );

                let outcome = if let Some(ref sender) = progress_sender {
                    let file_name = task_repo::find_by_id(&db, &job.task_id)
                        .ok()
                        .flatten()
                        .map(|t| t.file_name)
                        .unwrap_or_else(|| "unknown".to_string());
                    let progress =
                        BroadcastProgress::new(&job.task_id, &file_name, Arc::clone(sender));
                    pipeline.run(&job, &progress)
                } else {
                    pipeline.run(&job, &NoopProgress)
                };

                let result = match outcome {
                    Ok(summary) => JobResult::success(&job, summary),
                    Err(e) if e.is_retryable() && job.attempt < retry.max_attempts => {
                        warn!(
                            "Task {} attempt {} failed ({}), retrying in {:?}",
                            job.task_id, job.attempt, e, retry.delay
                        );
                        thread::sleep(retry.delay);
                        match re_enqueue(&db, &job_sender, &job) {
                            Ok(()) => continue,
                            Err(reason) => {
                                // The failure already recorded on the
                                // task stands.
                                error!(
                                    "Worker {} giving up on task {}: {}",
                                    worker_id, job.task_id, reason
                                );
                                JobResult::failure(&job, e.to_string())
                            }
                        }
                    }
                    Err(e) => {
                        if e.is_retryable() {
                            error!(
                                "Task {} failed after {} attempts: {}",
                                job.task_id, job.attempt, e
                            );
                        } else {
                            error!("Task {} failed permanently: {}", job.task_id, e);
                        }
                        JobResult::failure(&job, e.to_string())
                    }
                };

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Puts a failed task back to pending and queues the next attempt.
/// The failed status is terminal, so without the reset the next run
/// would skip the task.
fn re_enqueue(db: &Database, job_sender: &Sender<Job>, job: &Job) -> Result<(), String> {
    match task_repo::reset_for_retry(db, &job.task_id) {
        Ok(true) => {}
        Ok(false) => return Err("task is no longer failed".to_string()),
        Err(e) => return Err(format!("reset failed: {}", e)),
    }

    job_sender
        .try_send(job.retry())
        .map_err(|e| format!("could not re-enqueue: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Classification, ClassifyError};
    use crate::db::TaskStatus;
    use std::io::Write;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(10),
        }
    }

    struct StubClassifier;

    impl Classifier for StubClassifier {
        fn classify(&self, _description: &str) -> Result<Classification, ClassifyError> {
            Ok(Classification {
                code: "0901.11.00".to_string(),
                confidence: 0.9,
                rationale: String::new(),
                alternatives: vec![],
            })
        }
    }

    /// Fails a fixed number of classifications before recovering.
    struct FlakyClassifier {
        failures_left: AtomicUsize,
    }

    impl Classifier for FlakyClassifier {
        fn classify(&self, _description: &str) -> Result<Classification, ClassifyError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(ClassifyError::Inference("temporarily down".to_string()));
            }
            Ok(Classification {
                code: "0901.11.00".to_string(),
                confidence: 0.9,
                rationale: String::new(),
                alternatives: vec![],
            })
        }
    }

    fn seeded(dir: &TempDir, rows: usize) -> (Database, task_repo::TaskRow) {
        let db = Database::open_in_memory().expect("Failed to create test database");
        crate::db::code_repo::get_or_create(&db, "0901.11.00", "Кофе", "cat", None).unwrap();

        let path = dir.path().join("goods.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Наименование,Количество,Единица").unwrap();
        for i in 0..rows {
            writeln!(file, "Кофе {},1,кг", i).unwrap();
        }

        let task = task_repo::TaskRow::new("u1", "goods.csv", path.to_str().unwrap());
        task_repo::insert(&db, &task).unwrap();
        (db, task)
    }

    #[test]
    fn test_pool_lifecycle() {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let pool = WorkerPool::new(db, Arc::new(StubClassifier), 2, fast_retry());
        assert!(!pool.is_shutdown());
        pool.shutdown();
        assert!(pool.is_shutdown());
        pool.wait();
    }

    #[test]
    fn test_submit_and_process() {
        let dir = TempDir::new().unwrap();
        let (db, task) = seeded(&dir, 3);
        let pool = WorkerPool::new(db.clone(), Arc::new(StubClassifier), 1, fast_retry());

        pool.submit(Job::first_attempt(&task.id)).unwrap();
        let result = pool.recv_result().unwrap();
        assert!(result.success, "task failed: {:?}", result.error);
        assert_eq!(result.attempt, 1);
        assert_eq!(result.summary.unwrap().processed_items, 3);

        let stored = task_repo::find_by_id(&db, &task.id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_transient_failure_retried_until_success() {
        let dir = TempDir::new().unwrap();
        let (db, task) = seeded(&dir, 2);
        let classifier = Arc::new(FlakyClassifier {
            failures_left: AtomicUsize::new(1),
        });
        let pool = WorkerPool::new(db.clone(), classifier, 1, fast_retry());

        pool.submit(Job::first_attempt(&task.id)).unwrap();
        let result = pool.recv_result().unwrap();
        assert!(result.success);
        assert_eq!(result.attempt, 2);

        let stored = task_repo::find_by_id(&db, &task.id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(
            crate::db::item_repo::count_by_task(&db, &task.id).unwrap(),
            2
        );

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_retries_exhausted_leaves_task_failed() {
        let dir = TempDir::new().unwrap();
        let (db, task) = seeded(&dir, 2);
        let classifier = Arc::new(FlakyClassifier {
            failures_left: AtomicUsize::new(100),
        });
        let pool = WorkerPool::new(db.clone(), classifier, 1, fast_retry());

        pool.submit(Job::first_attempt(&task.id)).unwrap();
        let result = pool.recv_result().unwrap();
        assert!(!result.success);
        assert_eq!(result.attempt, 3);
        assert!(result.error.unwrap().contains("temporarily down"));

        let stored = task_repo::find_by_id(&db, &task.id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert!(stored.error.is_some());

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_fatal_error_not_retried() {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let pool = WorkerPool::new(db, Arc::new(StubClassifier), 1, fast_retry());

        pool.submit(Job::first_attempt("missing-task")).unwrap();
        let result = pool.recv_result().unwrap();
        assert!(!result.success);
        assert_eq!(result.attempt, 1);

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let pool = WorkerPool::new(db, Arc::new(StubClassifier), 1, fast_retry());
        pool.shutdown();
        assert!(pool.submit(Job::first_attempt("t")).is_err());
        pool.wait();
    }
}
