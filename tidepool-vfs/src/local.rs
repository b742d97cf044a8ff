//! Directory-rooted project filesystem over `tokio::fs`.

use async_trait::async_trait;
use std::path::PathBuf;
use tidepool_types::FileKind;
use tokio::fs;

use crate::path::validate;
use crate::{DirEntry, FileMeta, FsError, FsResult, ProjectFs};

/// A [`ProjectFs`] rooted at a real directory.
///
/// Project paths map under the root (`/src/main.ts` →
/// `<root>/src/main.ts`); validation rejects traversal before any path
/// reaches the host filesystem.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The host directory backing this filesystem.
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> FsResult<PathBuf> {
        validate(path)?;
        if path == "/" {
            return Ok(self.root.clone());
        }
        Ok(self.root.join(&path[1..]))
    }
}

fn map_io(path: &str, err: std::io::Error) -> FsError {
    match err.kind() {
        std::io::ErrorKind::NotFound => FsError::NotFound(path.to_string()),
        std::io::ErrorKind::NotADirectory => FsError::NotADirectory(path.to_string()),
        std::io::ErrorKind::IsADirectory => FsError::IsADirectory(path.to_string()),
        _ => FsError::Io(format!("{path}: {err}")),
    }
}

#[async_trait]
impl ProjectFs for LocalFs {
    async fn list_dir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let dir = self.resolve(path)?;
        let mut reader = fs::read_dir(&dir).await.map_err(|e| map_io(path, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| map_io(path, e))? {
            let file_type = entry.file_type().await.map_err(|e| map_io(path, e))?;
            let kind = if file_type.is_dir() {
                FileKind::Folder
            } else {
                FileKind::File
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn metadata(&self, path: &str) -> FsResult<FileMeta> {
        let resolved = self.resolve(path)?;
        let meta = fs::metadata(&resolved).await.map_err(|e| map_io(path, e))?;
        Ok(FileMeta {
            kind: if meta.is_dir() {
                FileKind::Folder
            } else {
                FileKind::File
            },
            size: if meta.is_dir() { 0 } else { meta.len() },
        })
    }

    async fn read(&self, path: &str) -> FsResult<Vec<u8>> {
        let resolved = self.resolve(path)?;
        fs::read(&resolved).await.map_err(|e| map_io(path, e))
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> FsResult<()> {
        let resolved = self.resolve(path)?;
        fs::write(&resolved, bytes)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn create_dir_all(&self, path: &str) -> FsResult<()> {
        let resolved = self.resolve(path)?;
        fs::create_dir_all(&resolved)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn remove(&self, path: &str) -> FsResult<()> {
        let resolved = self.resolve(path)?;
        let meta = fs::metadata(&resolved).await.map_err(|e| map_io(path, e))?;
        if meta.is_dir() {
            fs::remove_dir_all(&resolved)
                .await
                .map_err(|e| map_io(path, e))
        } else {
            fs::remove_file(&resolved)
                .await
                .map_err(|e| map_io(path, e))
        }
    }
}
