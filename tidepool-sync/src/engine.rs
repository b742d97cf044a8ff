//! The per-project engine: one full sync pass, and restore on startup.

use std::sync::Arc;
use std::time::Duration;

use tidepool_store::{BlobStore, ProjectStore, StoreError};
use tidepool_types::ProjectId;
use tidepool_vfs::ProjectFs;
use tracing::warn;

use crate::detect::detect;
use crate::scheduler::DEBOUNCE_WINDOW;
use crate::uploader::{SyncOutcome, TEXT_SIZE_LIMIT, UPLOAD_BATCH_SIZE, upload};
use crate::walker::walk;
use crate::{SyncError, SyncResult};

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet window between the last change notification and the pass.
    pub debounce: Duration,
    /// Files pushed per sequential upload batch.
    pub batch_size: usize,
    /// Largest content the text route accepts inline, in bytes.
    pub text_size_limit: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: DEBOUNCE_WINDOW,
            batch_size: UPLOAD_BATCH_SIZE,
            text_size_limit: TEXT_SIZE_LIMIT,
        }
    }
}

/// Sync engine for a single project.
///
/// Holds shared handles to the project filesystem and the storage backends;
/// clones are cheap and drive the same project.
#[derive(Clone)]
pub struct SyncEngine {
    project: ProjectId,
    fs: Arc<dyn ProjectFs>,
    store: Arc<dyn ProjectStore>,
    blobs: Arc<dyn BlobStore>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        project: ProjectId,
        fs: Arc<dyn ProjectFs>,
        store: Arc<dyn ProjectStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self::with_config(project, fs, store, blobs, SyncConfig::default())
    }

    pub fn with_config(
        project: ProjectId,
        fs: Arc<dyn ProjectFs>,
        store: Arc<dyn ProjectStore>,
        blobs: Arc<dyn BlobStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            project,
            fs,
            store,
            blobs,
            config,
        }
    }

    pub fn project(&self) -> ProjectId {
        self.project
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs one full pass: walk the tree, diff against the manifest, push
    /// the differences, commit the new manifest.
    ///
    /// Aborts before any remote write when the store holds no credentials.
    /// A manifest fetch that fails for any other reason than `Unauthorized`
    /// flips the pass into fail-safe mode: every local file counts as
    /// changed, nothing counts as deleted, and the commit is unguarded.
    pub async fn sync_once(&self) -> SyncResult<SyncOutcome> {
        if !self.store.is_authenticated().await {
            return Err(SyncError::Unauthorized("no credentials configured".into()));
        }

        let records = walk(self.fs.as_ref()).await?;

        let manifest = match self.store.fetch_manifest(self.project).await {
            Ok(manifest) => Some(manifest),
            Err(e @ StoreError::Unauthorized(_)) => return Err(e.into()),
            Err(e) => {
                warn!("Manifest fetch for {} failed: {e}", self.project);
                None
            }
        };

        let changes = detect(self.fs.as_ref(), records, manifest.as_ref()).await;
        upload(
            self.fs.as_ref(),
            self.store.as_ref(),
            self.blobs.as_ref(),
            self.project,
            changes,
            manifest.as_ref(),
            &self.config,
        )
        .await
    }

    /// Rebuilds an empty local tree from the remote snapshot. Returns
    /// whether anything was restored.
    pub async fn restore(&self) -> SyncResult<bool> {
        crate::restore::restore(
            self.fs.as_ref(),
            self.store.as_ref(),
            self.blobs.as_ref(),
            self.project,
        )
        .await
    }
}
