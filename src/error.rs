//! Error taxonomy for the batch pipeline.
//!
//! Only directory-level, configuration, and persistence failures escape
//! the chunk loop. [`PipelineError::Encode`] and
//! [`PipelineError::ChunkSubmission`] are produced at their origin and
//! converted into data (an exclusion or a failure record) by the
//! orchestrator.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("input directory does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("no image files found in {}", .0.display())]
    NoInputItems(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to encode {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    #[error("chunk {chunk} submission failed: {message}")]
    ChunkSubmission { chunk: usize, message: String },

    #[error("failed to write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read results from {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("aggregation failed: {0}")]
    Aggregation(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
