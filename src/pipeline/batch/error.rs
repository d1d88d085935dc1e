use thiserror::Error;

use crate::pipeline::structuring::StructuringError;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Cannot read {file}: {reason}")]
    Unreadable { file: String, reason: String },

    #[error("Structured extraction failed: {0}")]
    Structuring(#[from] StructuringError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Output directory {path} unavailable: {reason}")]
    OutputDir { path: String, reason: String },
}

impl BatchError {
    /// Failures outside the document's own content (disk, encoding). The
    /// runner waits the extended cooldown after these.
    pub fn is_severe(&self) -> bool {
        matches!(self, BatchError::Io(_) | BatchError::Serialization(_))
    }
}
