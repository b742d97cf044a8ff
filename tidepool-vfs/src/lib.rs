//! Ephemeral project filesystem abstraction.
//!
//! The sync engine never touches a concrete filesystem directly; it works
//! against the [`ProjectFs`] trait. Two implementations ship with the crate:
//!
//! - [`MemoryFs`]: an in-memory tree with the same shape as a browser
//!   session's filesystem. Cheap to clone (clones share the tree), used by
//!   most tests and by short-lived preview sessions.
//! - [`LocalFs`]: rooted at a real directory via `tokio::fs`, used for
//!   server-side mirrors and local development.
//!
//! Paths are absolute and `/`-separated (`/src/main.ts`). Relative paths,
//! `.`/`..` components, and empty components are rejected with
//! [`FsError::InvalidPath`].

mod local;
mod memory;
mod path;

pub use local::LocalFs;
pub use memory::MemoryFs;
pub use path::{join, parent, validate};

use async_trait::async_trait;
use tidepool_types::FileKind;

/// Result type alias using the crate's error type.
pub type FsResult<T> = std::result::Result<T, FsError>;

/// Errors surfaced by filesystem operations.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("not valid UTF-8: {0}")]
    NotUtf8(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("io error: {0}")]
    Io(String),
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileKind,
}

/// Metadata for a single tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub kind: FileKind,
    pub size: u64,
}

/// The ephemeral filesystem the engine syncs from and restores into.
///
/// Writes are plain upserts: `write` replaces existing content, and
/// `create_dir_all` tolerates directories that already exist. `write`
/// requires the parent directory to exist; restoration creates folders
/// before files for exactly that reason.
#[async_trait]
pub trait ProjectFs: Send + Sync {
    /// Lists the direct children of a directory, sorted by name.
    async fn list_dir(&self, path: &str) -> FsResult<Vec<DirEntry>>;

    /// Returns kind and size for a path.
    async fn metadata(&self, path: &str) -> FsResult<FileMeta>;

    /// Reads a file's raw bytes.
    async fn read(&self, path: &str) -> FsResult<Vec<u8>>;

    /// Reads a file as UTF-8 text; [`FsError::NotUtf8`] for binary content.
    async fn read_to_string(&self, path: &str) -> FsResult<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes).map_err(|_| FsError::NotUtf8(path.to_string()))
    }

    /// Creates or replaces a file. The parent directory must exist.
    async fn write(&self, path: &str, bytes: &[u8]) -> FsResult<()>;

    /// Creates a directory and any missing ancestors.
    async fn create_dir_all(&self, path: &str) -> FsResult<()>;

    /// Removes a file, or a directory together with its subtree.
    async fn remove(&self, path: &str) -> FsResult<()>;
}
