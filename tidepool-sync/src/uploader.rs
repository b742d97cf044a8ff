//! Dual-route uploader: text rows travel inline, binaries go through blob
//! storage, and the pass ends with a wholesale manifest replace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidepool_store::{AssetRecord, BlobStore, ManifestGuard, ProjectStore, TextRecord};
use tidepool_types::{ContentHash, FileRecord, Manifest, ProjectId, mime_for_path};
use tidepool_vfs::ProjectFs;
use tracing::{debug, info, warn};

use crate::detect::{ChangeSet, IndexEntry};
use crate::engine::SyncConfig;
use crate::{SyncError, SyncResult};

/// Largest content the text route accepts inline, in bytes.
pub const TEXT_SIZE_LIMIT: u64 = 1024 * 1024;

/// Files pushed per sequential batch.
pub const UPLOAD_BATCH_SIZE: usize = 10;

/// Summary of one completed sync pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    /// Files whose bytes were pushed this pass.
    pub synced: usize,
    /// Files whose bytes were already remote and were not re-sent.
    pub skipped: usize,
    /// Per-file failures as `"<path>: <message>"`.
    pub errors: Vec<String>,
    /// Stamp of the manifest now stored. `None` only when the pass had
    /// nothing to do and the project has never synced.
    pub last_sync_at: Option<DateTime<Utc>>,
}

enum FileOutcome {
    Uploaded(ContentHash),
    Cached(ContentHash),
}

/// Applies a change set to the remote: deletions first, then changed files
/// in batches, then the manifest commit.
///
/// `prior` is the manifest the change set was diffed against; the commit is
/// guarded on its `last_sync_at` stamp so two writers cannot silently
/// overwrite each other. A `None` prior means the manifest could not be
/// read, and the commit is unguarded because the pass re-uploaded every
/// local file.
///
/// Per-file failures are contained: the file lands in
/// [`SyncOutcome::errors`] and its manifest entry keeps the previously
/// synced hash, so the next pass retries it. Only pass-level faults (the
/// manifest commit itself, a guard conflict) abort with `Err`.
///
/// An empty change set returns without writing anything, so a no-change
/// pass leaves the stored manifest byte-identical.
pub async fn upload(
    fs: &dyn ProjectFs,
    store: &dyn ProjectStore,
    blobs: &dyn BlobStore,
    project: ProjectId,
    changes: ChangeSet,
    prior: Option<&Manifest>,
    config: &SyncConfig,
) -> SyncResult<SyncOutcome> {
    if changes.is_empty() {
        debug!("No changes, skipping manifest commit");
        return Ok(SyncOutcome {
            synced: 0,
            skipped: 0,
            errors: Vec::new(),
            last_sync_at: prior.and_then(|m| m.last_sync_at),
        });
    }

    let guard = match prior {
        Some(manifest) => ManifestGuard::LastSyncAt(manifest.last_sync_at),
        None => ManifestGuard::Any,
    };

    let ChangeSet {
        changed,
        deleted,
        mut index,
    } = changes;
    let mut synced = 0;
    let mut skipped = 0;
    let mut errors = Vec::new();

    // Deletions run exactly once, before any batch. On failure the deleted
    // paths keep their prior manifest entries so the next pass retries them.
    if !deleted.is_empty() {
        match store.delete_paths(project, &deleted).await {
            Ok(orphaned) => {
                debug!("Deleted {} remote paths", deleted.len());
                if !orphaned.is_empty() {
                    if let Err(e) = blobs.delete(&orphaned).await {
                        warn!("Failed to reclaim {} orphaned blobs: {e}", orphaned.len());
                    }
                }
            }
            Err(e) => {
                warn!("Failed to delete {} remote paths: {e}", deleted.len());
                for path in &deleted {
                    errors.push(format!("{path}: {e}"));
                    if let Some(&hash) = prior.and_then(|m| m.hash_for(path)) {
                        index.insert(path.clone(), IndexEntry { hash, size: 0 });
                    }
                }
            }
        }
    }

    for batch in changed.chunks(config.batch_size.max(1)) {
        for record in batch {
            match upload_file(fs, store, blobs, project, record, config).await {
                Ok(FileOutcome::Uploaded(hash)) => {
                    synced += 1;
                    index.insert(
                        record.path.clone(),
                        IndexEntry {
                            hash,
                            size: record.size,
                        },
                    );
                }
                Ok(FileOutcome::Cached(hash)) => {
                    skipped += 1;
                    index.insert(
                        record.path.clone(),
                        IndexEntry {
                            hash,
                            size: record.size,
                        },
                    );
                }
                Err(e) => {
                    warn!("Failed to sync {}: {e}", record.path);
                    errors.push(format!("{}: {e}", record.path));
                    // Keep the manifest pointing at whatever the remote
                    // actually holds for this path.
                    match prior.and_then(|m| m.hash_for(&record.path)) {
                        Some(&hash) => {
                            index.insert(
                                record.path.clone(),
                                IndexEntry {
                                    hash,
                                    size: record.size,
                                },
                            );
                        }
                        None => {
                            index.remove(&record.path);
                        }
                    }
                }
            }
        }
    }

    let now = Utc::now();
    let manifest = Manifest {
        project_id: project,
        entries: index
            .iter()
            .map(|(path, entry)| (path.clone(), entry.hash))
            .collect(),
        total_files: index.len() as u64,
        total_size: index.values().map(|entry| entry.size).sum(),
        last_sync_at: Some(now),
    };
    store.commit_manifest(&manifest, guard).await?;

    info!(
        "Sync pass finished: {synced} uploaded, {skipped} cached, {} failed, {} files tracked",
        errors.len(),
        manifest.total_files,
    );

    Ok(SyncOutcome {
        synced,
        skipped,
        errors,
        last_sync_at: Some(now),
    })
}

/// Pushes one changed file over the appropriate route.
///
/// Inline content at or under the size ceiling takes the text route.
/// Oversized content is accepted on the blob route only while the text
/// route does not already track the path; an oversized rewrite of an
/// existing text row fails instead of forking the path across routes.
async fn upload_file(
    fs: &dyn ProjectFs,
    store: &dyn ProjectStore,
    blobs: &dyn BlobStore,
    project: ProjectId,
    record: &FileRecord,
    config: &SyncConfig,
) -> SyncResult<FileOutcome> {
    match &record.content {
        Some(content) if record.size <= config.text_size_limit => {
            let hash = match record.hash {
                Some(hash) => hash,
                None => ContentHash::of(content.as_bytes()),
            };
            store
                .upsert_text(&TextRecord {
                    project_id: project,
                    path: record.path.clone(),
                    content: content.clone(),
                    hash,
                    size: record.size,
                    mime_type: mime_for_path(&record.path).to_string(),
                })
                .await?;
            Ok(FileOutcome::Uploaded(hash))
        }
        Some(content) => {
            if store.text_exists(project, &record.path).await? {
                return Err(SyncError::FileTooLarge(record.size));
            }
            upload_blob(store, blobs, project, record, content.as_bytes()).await
        }
        None => {
            let bytes = fs.read(&record.path).await?;
            upload_blob(store, blobs, project, record, &bytes).await
        }
    }
}

async fn upload_blob(
    store: &dyn ProjectStore,
    blobs: &dyn BlobStore,
    project: ProjectId,
    record: &FileRecord,
    bytes: &[u8],
) -> SyncResult<FileOutcome> {
    let hash = match record.hash {
        Some(hash) => hash,
        None => ContentHash::of(bytes),
    };

    if let Some(existing) = store.asset_at(project, &record.path).await? {
        if existing.hash == hash {
            debug!("Blob for {} is already stored, skipping upload", record.path);
            return Ok(FileOutcome::Cached(hash));
        }
        // Content changed under the same path; the old blob is superseded
        // the moment the new handle is recorded.
        if let Err(e) = blobs.delete(std::slice::from_ref(&existing.blob_key)).await {
            warn!("Failed to reclaim superseded blob for {}: {e}", record.path);
        }
    }

    let mime_type = mime_for_path(&record.path);
    let handle = blobs.upload(project, &record.path, bytes, mime_type).await?;
    store
        .upsert_asset(&AssetRecord {
            project_id: project,
            path: record.path.clone(),
            blob_url: handle.url,
            blob_key: handle.key,
            hash,
            size: record.size,
            mime_type: mime_type.to_string(),
        })
        .await?;
    Ok(FileOutcome::Uploaded(hash))
}
