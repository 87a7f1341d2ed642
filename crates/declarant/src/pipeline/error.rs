use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Ingestion failed: {0}")]
    Ingestion(#[from] crate::ingest::IngestError),

    #[error("Classification failed: {0}")]
    Classification(#[from] crate::classify::ClassifyError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

impl PipelineError {
    /// Whether a retry could plausibly succeed. A missing task or an
    /// unreadable file will fail identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Classification(_) | Self::Database(_))
    }
}
