//! Error types for the sync layer.

use thiserror::Error;
use tidepool_store::StoreError;
use tidepool_types::ProjectId;
use tidepool_vfs::FsError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync and restore operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Store backend error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Project filesystem error.
    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),

    /// Missing or rejected credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A file exceeded the inline-text ceiling on the text route.
    /// The `File too large` wording is matched by hosted-UI error filters.
    #[error("File too large ({0} bytes)")]
    FileTooLarge(u64),

    /// A pass for this project is already running.
    #[error("sync already in flight for project {0}")]
    SyncInFlight(ProjectId),

    /// The scheduler has no engine registered for this project.
    #[error("project {0} is not registered")]
    ProjectNotRegistered(ProjectId),

    /// Restore refused because the target tree already has entries.
    #[error("restore target is not empty ({0} entries)")]
    RestoreTargetNotEmpty(usize),
}
