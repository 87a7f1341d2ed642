//! The processing pipeline: ingest an uploaded spreadsheet, classify
//! every row, and drive the task state machine.

pub mod error;
pub mod progress;
pub mod runner;

pub use error::PipelineError;
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{Pipeline, RunSummary};
