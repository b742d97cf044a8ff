//! In-memory project filesystem.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tidepool_types::FileKind;
use tokio::sync::RwLock;

use crate::path::{join, parent, validate};
use crate::{DirEntry, FileMeta, FsError, FsResult, ProjectFs};

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Folder,
}

/// An in-memory tree keyed by absolute path. The root `/` always exists and
/// is never stored explicitly.
///
/// Clones share the underlying tree, so a test can hand the filesystem to an
/// engine and keep a handle for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    nodes: Arc<RwLock<BTreeMap<String, Node>>>,
}

impl MemoryFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a file, creating any missing parent directories first.
    ///
    /// Convenience for building trees in tests and session bootstrap; the
    /// trait's `write` is deliberately strict about parents.
    pub async fn seed(&self, path: &str, bytes: &[u8]) -> FsResult<()> {
        if let Some(dir) = parent(path) {
            self.create_dir_all(dir).await?;
        }
        self.write(path, bytes).await
    }

    /// `seed` for text content.
    pub async fn seed_text(&self, path: &str, text: &str) -> FsResult<()> {
        self.seed(path, text.as_bytes()).await
    }

    /// Total number of stored nodes (files and folders), excluding the root.
    pub async fn node_count(&self) -> usize {
        self.nodes.read().await.len()
    }

    async fn require_dir(&self, path: &str) -> FsResult<()> {
        if path == "/" {
            return Ok(());
        }
        match self.nodes.read().await.get(path) {
            Some(Node::Folder) => Ok(()),
            Some(Node::File(_)) => Err(FsError::NotADirectory(path.to_string())),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }
}

#[async_trait]
impl ProjectFs for MemoryFs {
    async fn list_dir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        validate(path)?;
        self.require_dir(path).await?;
        let nodes = self.nodes.read().await;
        let mut entries = Vec::new();
        for (node_path, node) in nodes.iter() {
            if parent(node_path) == Some(path) {
                let name = node_path.rsplit('/').next().unwrap_or(node_path);
                entries.push(DirEntry {
                    name: name.to_string(),
                    kind: match node {
                        Node::File(_) => FileKind::File,
                        Node::Folder => FileKind::Folder,
                    },
                });
            }
        }
        // BTreeMap iteration already yields children sorted by name.
        Ok(entries)
    }

    async fn metadata(&self, path: &str) -> FsResult<FileMeta> {
        validate(path)?;
        if path == "/" {
            return Ok(FileMeta {
                kind: FileKind::Folder,
                size: 0,
            });
        }
        match self.nodes.read().await.get(path) {
            Some(Node::File(bytes)) => Ok(FileMeta {
                kind: FileKind::File,
                size: bytes.len() as u64,
            }),
            Some(Node::Folder) => Ok(FileMeta {
                kind: FileKind::Folder,
                size: 0,
            }),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    async fn read(&self, path: &str) -> FsResult<Vec<u8>> {
        validate(path)?;
        match self.nodes.read().await.get(path) {
            Some(Node::File(bytes)) => Ok(bytes.clone()),
            Some(Node::Folder) => Err(FsError::IsADirectory(path.to_string())),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> FsResult<()> {
        validate(path)?;
        if path == "/" {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        if let Some(dir) = parent(path) {
            self.require_dir(dir).await?;
        }
        let mut nodes = self.nodes.write().await;
        if let Some(Node::Folder) = nodes.get(path) {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        nodes.insert(path.to_string(), Node::File(bytes.to_vec()));
        Ok(())
    }

    async fn create_dir_all(&self, path: &str) -> FsResult<()> {
        validate(path)?;
        if path == "/" {
            return Ok(());
        }
        let mut nodes = self.nodes.write().await;
        let mut prefix = String::new();
        for component in path[1..].split('/') {
            prefix.push('/');
            prefix.push_str(component);
            match nodes.get(&prefix) {
                Some(Node::File(_)) => return Err(FsError::NotADirectory(prefix.clone())),
                Some(Node::Folder) => {}
                None => {
                    nodes.insert(prefix.clone(), Node::Folder);
                }
            }
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> FsResult<()> {
        validate(path)?;
        if path == "/" {
            return Err(FsError::InvalidPath(path.to_string()));
        }
        let mut nodes = self.nodes.write().await;
        match nodes.remove(path) {
            Some(Node::File(_)) => Ok(()),
            Some(Node::Folder) => {
                let subtree = format!("{path}/");
                nodes.retain(|p, _| !p.starts_with(&subtree));
                Ok(())
            }
            None => Err(FsError::NotFound(path.to_string())),
        }
    }
}
