//! Backend traits: the seam between the sync engine and durable storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tidepool_types::{Manifest, ProjectId};

use crate::StoreResult;
use crate::records::{AssetRecord, BlobHandle, ProjectSnapshot, TextRecord};

/// Concurrency guard applied when committing a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestGuard {
    /// Commit unconditionally. Used by passes that could not read the
    /// current manifest and have re-uploaded every file, so last-writer-wins
    /// cannot drop content.
    Any,
    /// Commit only if the stored manifest still carries this `last_sync_at`
    /// stamp (`None` means the manifest was absent or never stamped). A
    /// mismatch fails the commit with [`StoreError::Conflict`].
    ///
    /// [`StoreError::Conflict`]: crate::StoreError::Conflict
    LastSyncAt(Option<DateTime<Utc>>),
}

/// Durable project storage: manifests, text rows, and asset rows.
///
/// Implementations must be safe to call concurrently; the engine only
/// guarantees one sync pass per project at a time, not one per store.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Whether the store currently holds credentials to act at all.
    /// Backends without an auth concept report `true`.
    async fn is_authenticated(&self) -> bool {
        true
    }

    /// The stored manifest for a project, or an empty manifest if the
    /// project has never synced.
    async fn fetch_manifest(&self, project: ProjectId) -> StoreResult<Manifest>;

    /// Replace the stored manifest wholesale, subject to `guard`.
    async fn commit_manifest(&self, manifest: &Manifest, guard: ManifestGuard) -> StoreResult<()>;

    /// Whether a text row exists for this path.
    async fn text_exists(&self, project: ProjectId, path: &str) -> StoreResult<bool>;

    /// Insert or replace a text row keyed on (project, path).
    async fn upsert_text(&self, record: &TextRecord) -> StoreResult<()>;

    /// The asset row for this path, if one exists.
    async fn asset_at(&self, project: ProjectId, path: &str) -> StoreResult<Option<AssetRecord>>;

    /// Insert or replace an asset row keyed on (project, path).
    async fn upsert_asset(&self, record: &AssetRecord) -> StoreResult<()>;

    /// Remove the rows for `paths`, returning the blob keys orphaned by the
    /// removals so the caller can reclaim them. Backends that reclaim blobs
    /// themselves return an empty list.
    async fn delete_paths(&self, project: ProjectId, paths: &[String]) -> StoreResult<Vec<String>>;

    /// The full remote state of a project, or `None` if the store has never
    /// seen it.
    async fn fetch_snapshot(&self, project: ProjectId) -> StoreResult<Option<ProjectSnapshot>>;
}

/// Content-addressed blob storage for binary payloads.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return a handle to the new blob.
    async fn upload(
        &self,
        project: ProjectId,
        path: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> StoreResult<BlobHandle>;

    /// Reclaim blobs by key. Missing keys are not an error.
    async fn delete(&self, keys: &[String]) -> StoreResult<()>;

    /// Download a blob by the URL a [`BlobHandle`] carried.
    async fn fetch(&self, url: &str) -> StoreResult<Vec<u8>>;
}
