//! Error types for the analysis pipeline.

use thiserror::Error;

/// Errors surfaced by the pipeline stages.
///
/// Only `InsufficientData` and `IndexOutOfRange` are fatal to the operation
/// that raises them. Malformed input rows fail the ingestion read with
/// `Parse`. Everything else (empty documents, malformed document embeddings,
/// zero-mass score groups) is recovered locally with an explicit, logged
/// fallback and never reaches this enum.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("row {row}: {reason}")]
    Parse { row: usize, reason: String },

    #[error("not enough data: {required} documents required, corpus has {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unknown term: {0}")]
    UnknownTerm(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, PipelineError>;
