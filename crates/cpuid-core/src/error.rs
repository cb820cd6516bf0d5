//! Error types for snapshot loading and saving.

use std::path::PathBuf;

/// Errors that can occur while reading or writing register snapshots.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// JSON syntax or shape error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading/writing snapshot files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot file not found.
    #[error("snapshot file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// The document parsed but does not describe a valid machine.
    #[error("invalid snapshot: {detail}")]
    InvalidSnapshot {
        /// Description of the problem.
        detail: String,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
