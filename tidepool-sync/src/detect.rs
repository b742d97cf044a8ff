//! Change detection: diffs walked records against the remote manifest.

use std::collections::{BTreeMap, BTreeSet};

use tidepool_types::{ContentHash, FileRecord, Manifest};
use tidepool_vfs::ProjectFs;
use tracing::{debug, warn};

/// Hash and size for one local file, keyed by path in [`ChangeSet::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub hash: ContentHash,
    pub size: u64,
}

/// Output of one detection pass.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Local files whose content differs from (or is unknown to) the
    /// manifest, hashes filled in where the bytes were readable.
    pub changed: Vec<FileRecord>,
    /// Manifest paths with no local counterpart.
    pub deleted: Vec<String>,
    /// Path → (hash, size) for every hashable local file, changed or not.
    /// This is the basis for the post-sync manifest.
    pub index: BTreeMap<String, IndexEntry>,
}

impl ChangeSet {
    /// True when the pass has nothing to upload and nothing to delete.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// Diffs the walked `records` against `manifest`.
///
/// `manifest` is `None` when the manifest store was unreachable. That flips
/// the pass into fail-safe mode: every local file is reported changed and
/// nothing is reported deleted, so a manifest outage can cost redundant
/// uploads but never data. A present-but-empty manifest is simply a project
/// that has never synced.
///
/// Records without inline content are hashed from a raw read; if even that
/// read fails the file is unconditionally changed (and carries no hash), but
/// it still counts as present, so it is never misreported as deleted.
/// Folder records are not diffed.
pub async fn detect(
    fs: &dyn ProjectFs,
    records: Vec<FileRecord>,
    manifest: Option<&Manifest>,
) -> ChangeSet {
    if manifest.is_none() {
        warn!("Manifest unavailable, treating every local file as changed");
    }

    let mut changed = Vec::new();
    let mut index = BTreeMap::new();
    let mut local_paths = BTreeSet::new();

    for mut record in records {
        if !record.is_file() {
            continue;
        }
        local_paths.insert(record.path.clone());

        let hash = match &record.content {
            Some(text) => Some(ContentHash::of(text.as_bytes())),
            None => match fs.read(&record.path).await {
                Ok(bytes) => Some(ContentHash::of(&bytes)),
                Err(e) => {
                    warn!("Cannot hash {}: {e}", record.path);
                    None
                }
            },
        };

        let Some(hash) = hash else {
            changed.push(record);
            continue;
        };

        record.hash = Some(hash);
        index.insert(record.path.clone(), IndexEntry {
            hash,
            size: record.size,
        });
        if manifest.and_then(|m| m.hash_for(&record.path)) != Some(&hash) {
            changed.push(record);
        }
    }

    let deleted: Vec<String> = manifest
        .map(|m| {
            m.entries
                .keys()
                .filter(|path| !local_paths.contains(*path))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    debug!(
        "Detected {} changed, {} deleted across {} local files",
        changed.len(),
        deleted.len(),
        local_paths.len()
    );

    ChangeSet {
        changed,
        deleted,
        index,
    }
}
