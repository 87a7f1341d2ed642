//! Product classification.
//!
//! [`Classifier`] is the seam for a future model-backed implementation;
//! the shipped [`KeywordClassifier`] is a deterministic keyword matcher
//! with a random fallback, good enough to exercise the whole pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DatabaseError;

pub mod keyword;

pub use keyword::KeywordClassifier;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Code catalog error: {0}")]
    Catalog(#[from] DatabaseError),

    #[error("Classification failed: {0}")]
    Inference(String),
}

/// A lower-confidence candidate accompanying the main suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub code: String,
    pub confidence: f64,
}

/// A classifier verdict for one product description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub code: String,
    pub confidence: f64,
    pub rationale: String,
    pub alternatives: Vec<Alternative>,
}

/// Assigns a tariff code to a free-text product description.
pub trait Classifier: Send + Sync {
    fn classify(&self, description: &str) -> Result<Classification, ClassifyError>;
}
