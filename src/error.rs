//! Store-wide error kinds
//!
//! Every fallible operation in the store surfaces one of these kinds so
//! callers can distinguish "absent" from "broken" from "refused". Low-level
//! I/O errors are always wrapped with the operation name and the path they
//! touched.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Artifact, version, or catalog entry absent
    #[error("{what} not found: {path}")]
    NotFound { what: &'static str, path: String },

    /// Catalog or sidecar unreadable/malformed. Never auto-repaired.
    #[error("corrupt state in {}: {detail}", path.display())]
    CorruptState { path: PathBuf, detail: String },

    /// Temporary file write or rename failed; prior state is untouched
    #[error("atomic write failed for {}: {source}", path.display())]
    AtomicWriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Lineage traversal found a loop
    #[error("dependency cycle detected at {path}")]
    CycleDetected { path: String },

    /// User builder callback failed or returned a malformed bundle
    #[error("builder failed for {path}: {detail}")]
    BuilderFailure { path: String, detail: String },

    /// Invalid retention or plan arguments
    #[error("invalid policy: {0}")]
    PolicyError(String),

    /// Wrapped low-level I/O error with operation context
    #[error("{op} failed for {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Wrap an I/O error with the operation name and path it touched
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Build a `CorruptState` error for a file
    pub fn corrupt(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        StoreError::CorruptState {
            path: path.into(),
            detail: detail.into(),
        }
    }
}
