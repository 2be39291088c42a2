//! Error types for the data lifecycle engine
//!
//! Structural failures (unparseable documents, failed writes) surface as
//! [`LifecycleError`]. Per-entity import failures never abort a batch; they
//! are described by [`RejectReason`] and counted in the import report.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::types::NaturalKey;

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors that abort a lifecycle operation
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The snapshot payload is not a structured document of the expected shape
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// Archive persistence failed; the paired live delete was not applied
    #[error("Archive write failed for {key}: {source}")]
    ArchiveWriteFailed {
        key: NaturalKey,
        #[source]
        source: io::Error,
    },

    /// The backup directory could not be written
    #[error("Backup I/O error at {}: {source}", path.display())]
    BackupIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The live store rejected or failed to persist a mutation
    #[error("Live store error: {0}")]
    LiveStore(String),

    /// No live entity exists under the given key
    #[error("Entity not found: {0}")]
    NotFound(NaturalKey),

    /// An import asked for the latest snapshot but none exists
    #[error("No snapshot available in the backup directory")]
    NoSnapshotAvailable,

    /// A snapshot file name that does not name a file inside the backup directory
    #[error("Invalid snapshot name: {0}")]
    InvalidSnapshotName(String),

    /// Other file I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LifecycleError {
    pub fn malformed(message: impl Into<String>) -> Self {
        LifecycleError::MalformedSnapshot(message.into())
    }

    pub fn backup_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LifecycleError::BackupIo {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::MalformedSnapshot(_) => "MALFORMED_SNAPSHOT",
            LifecycleError::ArchiveWriteFailed { .. } => "ARCHIVE_WRITE_FAILED",
            LifecycleError::BackupIo { .. } => "BACKUP_IO_ERROR",
            LifecycleError::LiveStore(_) => "LIVE_STORE_ERROR",
            LifecycleError::NotFound(_) => "NOT_FOUND",
            LifecycleError::NoSnapshotAvailable => "NO_SNAPSHOT",
            LifecycleError::InvalidSnapshotName(_) => "INVALID_SNAPSHOT_NAME",
            LifecycleError::Io(_) => "IO_ERROR",
        }
    }
}

/// Why a single import candidate was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum RejectReason {
    #[error("entity is not a JSON object")]
    NotAnObject,

    #[error("missing or empty natural key field '{field}'")]
    MissingNaturalKey { field: &'static str },

    #[error("invalid field: {message}")]
    InvalidField { message: String },
}
