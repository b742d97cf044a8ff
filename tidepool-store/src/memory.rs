//! In-memory backends for tests and demos.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tidepool_types::{Manifest, ProjectId};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::records::{
    AssetRecord, BlobHandle, ProjectSnapshot, SnapshotFile, TextRecord, folder_prefixes,
};
use crate::store::{BlobStore, ManifestGuard, ProjectStore};
use crate::{StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    manifests: HashMap<ProjectId, Manifest>,
    texts: HashMap<ProjectId, BTreeMap<String, TextRecord>>,
    assets: HashMap<ProjectId, BTreeMap<String, AssetRecord>>,
    fail_paths: HashSet<String>,
    fail_deletes: bool,
    fail_manifest_fetches: bool,
    authenticated: bool,
    expired: bool,
    commit_calls: usize,
    delete_calls: usize,
}

/// In-memory [`ProjectStore`]. Clones share one underlying table set, so a
/// test can hand a clone to the engine and inspect state afterwards.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    // Writes block on this semaphore when set, letting tests hold a sync
    // pass mid-flight.
    gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let inner = Inner {
            authenticated: true,
            ..Inner::default()
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            gate: Arc::new(Mutex::new(None)),
        }
    }

    /// Make future writes to `path` fail with a storage error.
    pub fn fail_writes_for(&self, path: &str) {
        self.inner.lock().unwrap().fail_paths.insert(path.to_string());
    }

    /// Make `delete_paths` fail with a storage error.
    pub fn fail_deletes(&self) {
        self.inner.lock().unwrap().fail_deletes = true;
    }

    /// Make `fetch_manifest` fail with a network error, simulating a
    /// manifest service outage while the rest of the store stays up.
    pub fn fail_manifest_fetches(&self) {
        self.inner.lock().unwrap().fail_manifest_fetches = true;
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.inner.lock().unwrap().authenticated = authenticated;
    }

    /// Make every remote call fail with `Unauthorized` while
    /// [`ProjectStore::is_authenticated`] still reports `true`: credentials
    /// that expired server-side without the client noticing.
    pub fn expire_credentials(&self) {
        self.inner.lock().unwrap().expired = true;
    }

    /// Block text upserts on `gate` until the caller adds permits. Each
    /// upsert consumes one permit.
    pub fn gate_uploads(&self, gate: Arc<Semaphore>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    /// The stored text row, if any. Unlike [`ProjectStore::fetch_manifest`]
    /// this does not synthesize defaults for absent state.
    #[must_use]
    pub fn text_at(&self, project: ProjectId, path: &str) -> Option<TextRecord> {
        let inner = self.inner.lock().unwrap();
        inner.texts.get(&project).and_then(|rows| rows.get(path)).cloned()
    }

    /// The stored manifest row, if any.
    #[must_use]
    pub fn stored_manifest(&self, project: ProjectId) -> Option<Manifest> {
        self.inner.lock().unwrap().manifests.get(&project).cloned()
    }

    #[must_use]
    pub fn commit_calls(&self) -> usize {
        self.inner.lock().unwrap().commit_calls
    }

    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.inner.lock().unwrap().delete_calls
    }

    async fn wait_for_gate(&self) -> StoreResult<()> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| StoreError::Storage("upload gate closed".into()))?;
            permit.forget();
        }
        Ok(())
    }

    fn check_fail(&self, path: &str) -> StoreResult<()> {
        if self.inner.lock().unwrap().fail_paths.contains(path) {
            return Err(StoreError::Storage("injected write failure".into()));
        }
        Ok(())
    }

    fn check_expired(&self) -> StoreResult<()> {
        if self.inner.lock().unwrap().expired {
            return Err(StoreError::Unauthorized("credentials expired".into()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn is_authenticated(&self) -> bool {
        self.inner.lock().unwrap().authenticated
    }

    async fn fetch_manifest(&self, project: ProjectId) -> StoreResult<Manifest> {
        self.check_expired()?;
        let inner = self.inner.lock().unwrap();
        if inner.fail_manifest_fetches {
            return Err(StoreError::Network("injected manifest outage".into()));
        }
        Ok(inner
            .manifests
            .get(&project)
            .cloned()
            .unwrap_or_else(|| Manifest::empty(project)))
    }

    async fn commit_manifest(&self, manifest: &Manifest, guard: ManifestGuard) -> StoreResult<()> {
        self.check_expired()?;
        let mut inner = self.inner.lock().unwrap();
        if let ManifestGuard::LastSyncAt(expected) = guard {
            let current = inner
                .manifests
                .get(&manifest.project_id)
                .and_then(|m| m.last_sync_at);
            if current != expected {
                return Err(StoreError::Conflict(format!(
                    "manifest for {} changed since it was read",
                    manifest.project_id
                )));
            }
        }
        inner.manifests.insert(manifest.project_id, manifest.clone());
        inner.commit_calls += 1;
        Ok(())
    }

    async fn text_exists(&self, project: ProjectId, path: &str) -> StoreResult<bool> {
        self.check_expired()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .texts
            .get(&project)
            .is_some_and(|rows| rows.contains_key(path)))
    }

    async fn upsert_text(&self, record: &TextRecord) -> StoreResult<()> {
        self.wait_for_gate().await?;
        self.check_expired()?;
        self.check_fail(&record.path)?;
        let mut inner = self.inner.lock().unwrap();
        inner
            .texts
            .entry(record.project_id)
            .or_default()
            .insert(record.path.clone(), record.clone());
        Ok(())
    }

    async fn asset_at(&self, project: ProjectId, path: &str) -> StoreResult<Option<AssetRecord>> {
        self.check_expired()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .assets
            .get(&project)
            .and_then(|rows| rows.get(path))
            .cloned())
    }

    async fn upsert_asset(&self, record: &AssetRecord) -> StoreResult<()> {
        self.check_expired()?;
        self.check_fail(&record.path)?;
        let mut inner = self.inner.lock().unwrap();
        inner
            .assets
            .entry(record.project_id)
            .or_default()
            .insert(record.path.clone(), record.clone());
        Ok(())
    }

    async fn delete_paths(&self, project: ProjectId, paths: &[String]) -> StoreResult<Vec<String>> {
        self.check_expired()?;
        let mut inner = self.inner.lock().unwrap();
        inner.delete_calls += 1;
        if inner.fail_deletes {
            return Err(StoreError::Storage("injected delete failure".into()));
        }
        let mut orphaned = Vec::new();
        for path in paths {
            if let Some(rows) = inner.texts.get_mut(&project) {
                rows.remove(path);
            }
            if let Some(rows) = inner.assets.get_mut(&project) {
                if let Some(asset) = rows.remove(path) {
                    orphaned.push(asset.blob_key);
                }
            }
        }
        Ok(orphaned)
    }

    async fn fetch_snapshot(&self, project: ProjectId) -> StoreResult<Option<ProjectSnapshot>> {
        self.check_expired()?;
        let inner = self.inner.lock().unwrap();
        let texts = inner.texts.get(&project);
        let assets = inner.assets.get(&project);
        let manifest = inner.manifests.get(&project);
        if texts.is_none() && assets.is_none() && manifest.is_none() {
            return Ok(None);
        }

        let mut files: BTreeMap<String, SnapshotFile> = BTreeMap::new();
        for record in texts.into_iter().flat_map(BTreeMap::values) {
            files.insert(record.path.clone(), SnapshotFile::from_text(record));
        }
        for record in assets.into_iter().flat_map(BTreeMap::values) {
            files.insert(record.path.clone(), SnapshotFile::from_asset(record));
        }
        let folders = folder_prefixes(files.keys().map(String::as_str));
        Ok(Some(ProjectSnapshot {
            files: files.into_values().collect(),
            folders,
            manifest: manifest.cloned().unwrap_or_else(|| Manifest::empty(project)),
        }))
    }
}

#[derive(Default)]
struct BlobInner {
    blobs: HashMap<String, Vec<u8>>,
    fail_paths: HashSet<String>,
    upload_calls: usize,
    delete_calls: usize,
}

/// In-memory [`BlobStore`] companion to [`MemoryStore`]. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Mutex<BlobInner>>,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make future uploads for `path` fail with a storage error.
    pub fn fail_uploads_for(&self, path: &str) {
        self.inner.lock().unwrap().fail_paths.insert(path.to_string());
    }

    #[must_use]
    pub fn blob_count(&self) -> usize {
        self.inner.lock().unwrap().blobs.len()
    }

    #[must_use]
    pub fn upload_calls(&self) -> usize {
        self.inner.lock().unwrap().upload_calls
    }

    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.inner.lock().unwrap().delete_calls
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.lock().unwrap().blobs.contains_key(key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        project: ProjectId,
        path: &str,
        bytes: &[u8],
        _mime_type: &str,
    ) -> StoreResult<BlobHandle> {
        let mut inner = self.inner.lock().unwrap();
        inner.upload_calls += 1;
        if inner.fail_paths.contains(path) {
            return Err(StoreError::Storage("injected upload failure".into()));
        }
        let key = format!("{project}/{}", Uuid::new_v4());
        let url = format!("memory://{key}");
        inner.blobs.insert(key.clone(), bytes.to_vec());
        Ok(BlobHandle { url, key })
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.delete_calls += 1;
        for key in keys {
            inner.blobs.remove(key);
        }
        Ok(())
    }

    async fn fetch(&self, url: &str) -> StoreResult<Vec<u8>> {
        let key = url
            .strip_prefix("memory://")
            .ok_or_else(|| StoreError::NotFound(format!("unrecognized blob url: {url}")))?;
        let inner = self.inner.lock().unwrap();
        inner
            .blobs
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("no blob at {url}")))
    }
}
