//! Restore: rebuilds an empty ephemeral tree from the remote snapshot.

use std::collections::BTreeSet;

use tidepool_store::{BlobStore, ProjectStore, SnapshotFile, StoreError, folder_prefixes};
use tidepool_types::{FileKind, ProjectId};
use tidepool_vfs::ProjectFs;
use tracing::{debug, info, warn};

use crate::{SyncError, SyncResult};

/// Rebuilds the project tree from the stored snapshot.
///
/// Returns `Ok(true)` when a snapshot was materialized (possibly with
/// individual files skipped), `Ok(false)` when there was nothing to restore:
/// no credentials, no snapshot, or an empty one.
///
/// The target tree must be empty; restoring over live files would clobber
/// edits the remote has never seen, so a non-empty root refuses with
/// [`SyncError::RestoreTargetNotEmpty`] and leaves the tree untouched.
/// Remote `Unauthorized` is surfaced as an error because stale credentials
/// are actionable; transient fetch failures degrade to `Ok(false)` and the
/// caller tries again on its next startup.
pub async fn restore(
    fs: &dyn ProjectFs,
    store: &dyn ProjectStore,
    blobs: &dyn BlobStore,
    project: ProjectId,
) -> SyncResult<bool> {
    if !store.is_authenticated().await {
        debug!("Restore skipped, no credentials configured");
        return Ok(false);
    }

    let existing = fs.list_dir("/").await?;
    if !existing.is_empty() {
        return Err(SyncError::RestoreTargetNotEmpty(existing.len()));
    }

    let snapshot = match store.fetch_snapshot(project).await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) | Err(StoreError::NotFound(_)) => {
            debug!("No snapshot stored for {project}");
            return Ok(false);
        }
        Err(e @ StoreError::Unauthorized(_)) => return Err(e.into()),
        Err(e) => {
            warn!("Snapshot fetch for {project} failed: {e}");
            return Ok(false);
        }
    };
    if snapshot.files.is_empty() {
        debug!("Snapshot for {project} is empty");
        return Ok(false);
    }

    // Folders first, parents before children. The snapshot's own folder list
    // is merged with every ancestor of a file path, so a snapshot that never
    // recorded folders still materializes correctly.
    let mut folders: BTreeSet<String> = snapshot.folders.iter().cloned().collect();
    folders.extend(
        snapshot
            .files
            .iter()
            .filter(|f| f.kind == FileKind::Folder)
            .map(|f| f.path.clone()),
    );
    folders.extend(folder_prefixes(
        snapshot
            .files
            .iter()
            .filter(|f| f.kind == FileKind::File)
            .map(|f| f.path.as_str()),
    ));
    for folder in &folders {
        if let Err(e) = fs.create_dir_all(folder).await {
            warn!("Failed to create {folder}: {e}");
        }
    }

    let total = snapshot
        .files
        .iter()
        .filter(|f| f.kind == FileKind::File)
        .count();
    let mut restored = 0;
    for file in &snapshot.files {
        if file.kind != FileKind::File {
            continue;
        }
        match materialize(fs, blobs, file).await {
            Ok(()) => restored += 1,
            Err(e) => warn!("Failed to restore {}: {e}", file.path),
        }
    }

    info!("Restored {restored}/{total} files for {project}");
    Ok(true)
}

async fn materialize(
    fs: &dyn ProjectFs,
    blobs: &dyn BlobStore,
    file: &SnapshotFile,
) -> SyncResult<()> {
    match (&file.content, &file.url) {
        (Some(content), _) => fs.write(&file.path, content.as_bytes()).await?,
        (None, Some(url)) => {
            let bytes = blobs.fetch(url).await?;
            fs.write(&file.path, &bytes).await?;
        }
        (None, None) => {
            return Err(StoreError::Storage(format!(
                "snapshot entry {} has neither content nor a blob URL",
                file.path
            ))
            .into());
        }
    }
    Ok(())
}
