pub mod broadcast;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod review;
pub mod storage;
pub mod tasks;
pub mod worker;

pub use broadcast::TaskProgressBroadcaster;
pub use classify::{Classification, Classifier, ClassifyError, KeywordClassifier};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError, ItemStatus, TaskStatus};
pub use error::{ConfigError, DeclarantError, Result, StorageError, WorkerError};
pub use pipeline::{Pipeline, PipelineError, RunSummary};
pub use storage::UploadStore;
pub use worker::{Job, RetryPolicy, WorkerPool};
