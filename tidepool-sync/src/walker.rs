//! Local tree walker: turns the ephemeral filesystem into flat file records.
//!
//! One walk is the read-only first half of every sync pass. Build and
//! dependency directories are pruned before descent so their contents never
//! reach change detection, let alone the remote store.

use tidepool_types::{FileKind, FileRecord};
use tidepool_vfs::{FsError, ProjectFs, join};
use tracing::{debug, warn};

use crate::SyncResult;

/// Directory names pruned from the walk, wherever they appear in the tree.
pub const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".svn",
    ".hg",
    "dist",
    "build",
    "out",
    ".next",
    ".nuxt",
    ".cache",
    ".turbo",
    "coverage",
    "target",
    "tmp",
];

fn is_excluded(name: &str) -> bool {
    EXCLUDED_DIRS.contains(&name)
}

/// Walks the tree from `/` and returns one record per reachable node,
/// sorted by path.
///
/// Files are read as text where possible; binary or unreadable files are
/// still emitted, with `content = None`, so detection can track their
/// existence and the uploader can stream their bytes later. Folders are
/// emitted as records of their own so restoration can rebuild structure.
///
/// Listing failures anywhere in the tree fail the walk; per-file read
/// failures do not.
pub async fn walk(fs: &dyn ProjectFs) -> SyncResult<Vec<FileRecord>> {
    let mut records = Vec::new();
    let mut pending = vec!["/".to_string()];

    while let Some(dir) = pending.pop() {
        for entry in fs.list_dir(&dir).await? {
            let path = join(&dir, &entry.name);
            match entry.kind {
                FileKind::Folder => {
                    if is_excluded(&entry.name) {
                        debug!("Pruning excluded directory {path}");
                        continue;
                    }
                    records.push(FileRecord::folder(&path));
                    pending.push(path);
                }
                FileKind::File => {
                    let meta = match fs.metadata(&path).await {
                        Ok(meta) => meta,
                        Err(FsError::NotFound(_)) => {
                            // Vanished between listing and stat.
                            debug!("Skipping {path}: removed mid-walk");
                            continue;
                        }
                        Err(e) => {
                            warn!("Skipping {path}: {e}");
                            continue;
                        }
                    };
                    match fs.read_to_string(&path).await {
                        Ok(content) => records.push(FileRecord {
                            path,
                            kind: FileKind::File,
                            content: Some(content),
                            size: meta.size,
                            hash: None,
                        }),
                        Err(_) => records.push(FileRecord::binary(path, meta.size)),
                    }
                }
            }
        }
    }

    records.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(records)
}
