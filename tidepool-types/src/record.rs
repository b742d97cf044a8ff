//! File records produced by walking an ephemeral project tree.

use serde::{Deserialize, Serialize};

use crate::ContentHash;

/// Whether a tree node is a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Folder,
}

/// One node of the ephemeral tree at walk time.
///
/// `content` holds the file's text when the bytes are valid UTF-8; binary or
/// unreadable files carry `None` and are re-read from the filesystem when
/// their bytes are actually needed (hashing, blob upload). `hash` is filled
/// in by change detection, never by the walker.
///
/// Records are transient input to a sync pass and are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub kind: FileKind,
    pub content: Option<String>,
    pub size: u64,
    pub hash: Option<ContentHash>,
}

impl FileRecord {
    /// Creates a file record with inline text content.
    #[must_use]
    pub fn file(path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let size = content.len() as u64;
        Self {
            path: path.into(),
            kind: FileKind::File,
            content: Some(content),
            size,
            hash: None,
        }
    }

    /// Creates a file record whose content could not be read as text.
    #[must_use]
    pub fn binary(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            kind: FileKind::File,
            content: None,
            size,
            hash: None,
        }
    }

    /// Creates a folder record.
    #[must_use]
    pub fn folder(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: FileKind::Folder,
            content: None,
            size: 0,
            hash: None,
        }
    }

    /// True for `kind == File`.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }
}
