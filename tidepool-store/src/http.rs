//! Hosted API backend.
//!
//! Project rows live behind `/projects/{id}/...`; blob payloads behind
//! `/blobs`. Every request carries the configured bearer token.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use tidepool_types::{ContentHash, Manifest, ProjectId};
use tracing::debug;

use crate::records::{AssetRecord, BlobHandle, ProjectSnapshot, SnapshotFile, TextRecord};
use crate::store::{BlobStore, ManifestGuard, ProjectStore};
use crate::{StoreError, StoreResult};

/// Connection settings shared by [`HttpStore`] and [`HttpBlobStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpStoreConfig {
    /// Base URL of the API (e.g. `https://api.tidepool.dev`).
    pub base_url: String,
    /// Bearer token attached to every request. `None` means no credentials.
    pub auth_token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tidepool.dev".to_string(),
            auth_token: None,
            timeout_secs: 60,
        }
    }
}

// ── Wire payloads ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FilePayload<'a> {
    path: &'a str,
    content: &'a str,
    hash: ContentHash,
    size: u64,
    mime_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestPayload<'a> {
    entries: &'a BTreeMap<String, ContentHash>,
    total_files: u64,
    total_size: u64,
    last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncWriteBody<'a> {
    files: Vec<FilePayload<'a>>,
    deleted_paths: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest: Option<ManifestPayload<'a>>,
    // Serialized as an explicit `null` when the pass expects an unstamped
    // manifest; absent entirely for unconditional commits.
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_last_sync_at: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncWriteReply {
    #[serde(default)]
    orphaned_blob_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestReply {
    #[serde(default)]
    entries: BTreeMap<String, ContentHash>,
    #[serde(default)]
    total_files: u64,
    #[serde(default)]
    total_size: u64,
    #[serde(default)]
    last_sync_at: Option<DateTime<Utc>>,
}

impl ManifestReply {
    fn into_manifest(self, project: ProjectId) -> Manifest {
        Manifest {
            project_id: project,
            entries: self.entries,
            total_files: self.total_files,
            total_size: self.total_size,
            last_sync_at: self.last_sync_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotReply {
    files: Vec<SnapshotFile>,
    #[serde(default)]
    folders: Vec<String>,
    manifest: ManifestReply,
}

#[derive(Debug, Serialize)]
struct BlobDeleteBody<'a> {
    keys: &'a [String],
}

/// Maps a non-success response to the matching [`StoreError`].
async fn reject(response: reqwest::Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        body
    };
    match status.as_u16() {
        401 | 403 => StoreError::Unauthorized(detail),
        404 => StoreError::NotFound(detail),
        409 => StoreError::Conflict(detail),
        _ => StoreError::Network(format!("unexpected status {status}: {detail}")),
    }
}

/// [`ProjectStore`] backed by the hosted API.
pub struct HttpStore {
    config: HttpStoreConfig,
    client: Client,
}

impl HttpStore {
    pub fn new(config: HttpStoreConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to create HTTP client");

        Self { config, client }
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn project_url(&self, project: ProjectId, tail: &str) -> String {
        format!("{}/projects/{project}/{tail}", self.config.base_url)
    }
}

#[async_trait]
impl ProjectStore for HttpStore {
    async fn is_authenticated(&self) -> bool {
        self.config.auth_token.is_some()
    }

    async fn fetch_manifest(&self, project: ProjectId) -> StoreResult<Manifest> {
        let response = self
            .request(Method::GET, self.project_url(project, "manifest"))
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("manifest fetch failed: {e}")))?;

        if response.status().as_u16() == 404 {
            return Ok(Manifest::empty(project));
        }
        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        let reply: ManifestReply = response
            .json()
            .await
            .map_err(|e| StoreError::Network(format!("failed to parse manifest: {e}")))?;
        Ok(reply.into_manifest(project))
    }

    async fn commit_manifest(&self, manifest: &Manifest, guard: ManifestGuard) -> StoreResult<()> {
        debug!(
            "Committing manifest for {} ({} entries)",
            manifest.project_id,
            manifest.entries.len()
        );

        let body = SyncWriteBody {
            files: Vec::new(),
            deleted_paths: &[],
            manifest: Some(ManifestPayload {
                entries: &manifest.entries,
                total_files: manifest.total_files,
                total_size: manifest.total_size,
                last_sync_at: manifest.last_sync_at,
            }),
            expected_last_sync_at: match guard {
                ManifestGuard::Any => None,
                ManifestGuard::LastSyncAt(stamp) => Some(stamp),
            },
        };

        let response = self
            .request(Method::POST, self.project_url(manifest.project_id, "sync"))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("manifest commit failed: {e}")))?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }
        Ok(())
    }

    async fn text_exists(&self, project: ProjectId, path: &str) -> StoreResult<bool> {
        let response = self
            .request(Method::GET, self.project_url(project, "text"))
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("text probe failed: {e}")))?;

        if response.status().as_u16() == 404 {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(reject(response).await);
        }
        Ok(true)
    }

    async fn upsert_text(&self, record: &TextRecord) -> StoreResult<()> {
        let body = SyncWriteBody {
            files: vec![FilePayload {
                path: &record.path,
                content: &record.content,
                hash: record.hash,
                size: record.size,
                mime_type: &record.mime_type,
            }],
            deleted_paths: &[],
            manifest: None,
            expected_last_sync_at: None,
        };

        let response = self
            .request(Method::POST, self.project_url(record.project_id, "sync"))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("text upsert failed: {e}")))?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }
        Ok(())
    }

    async fn asset_at(&self, project: ProjectId, path: &str) -> StoreResult<Option<AssetRecord>> {
        let response = self
            .request(Method::GET, self.project_url(project, "asset"))
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("asset fetch failed: {e}")))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        let record: AssetRecord = response
            .json()
            .await
            .map_err(|e| StoreError::Network(format!("failed to parse asset: {e}")))?;
        Ok(Some(record))
    }

    async fn upsert_asset(&self, record: &AssetRecord) -> StoreResult<()> {
        let response = self
            .request(Method::PUT, self.project_url(record.project_id, "asset"))
            .json(record)
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("asset upsert failed: {e}")))?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }
        Ok(())
    }

    async fn delete_paths(&self, project: ProjectId, paths: &[String]) -> StoreResult<Vec<String>> {
        debug!("Deleting {} paths for {project}", paths.len());

        let body = SyncWriteBody {
            files: Vec::new(),
            deleted_paths: paths,
            manifest: None,
            expected_last_sync_at: None,
        };

        let response = self
            .request(Method::POST, self.project_url(project, "sync"))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("delete failed: {e}")))?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        let reply: SyncWriteReply = response
            .json()
            .await
            .map_err(|e| StoreError::Network(format!("failed to parse delete reply: {e}")))?;
        Ok(reply.orphaned_blob_keys)
    }

    async fn fetch_snapshot(&self, project: ProjectId) -> StoreResult<Option<ProjectSnapshot>> {
        let response = self
            .request(Method::GET, self.project_url(project, "snapshot"))
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("snapshot fetch failed: {e}")))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        let reply: SnapshotReply = response
            .json()
            .await
            .map_err(|e| StoreError::Network(format!("failed to parse snapshot: {e}")))?;
        Ok(Some(ProjectSnapshot {
            files: reply.files,
            folders: reply.folders,
            manifest: reply.manifest.into_manifest(project),
        }))
    }
}

/// [`BlobStore`] backed by the hosted blob service.
pub struct HttpBlobStore {
    config: HttpStoreConfig,
    client: Client,
}

impl HttpBlobStore {
    pub fn new(config: HttpStoreConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to create HTTP client");

        Self { config, client }
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(
        &self,
        project: ProjectId,
        path: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> StoreResult<BlobHandle> {
        debug!("Uploading blob for {project}: {path} ({} bytes)", bytes.len());

        let url = format!(
            "{}/blobs?project={project}&path={}",
            self.config.base_url,
            urlencoding::encode(path)
        );
        let response = self
            .request(Method::POST, url)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("blob upload failed: {e}")))?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| StoreError::Network(format!("failed to parse blob handle: {e}")))
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<()> {
        let response = self
            .request(Method::POST, format!("{}/blobs/delete", self.config.base_url))
            .json(&BlobDeleteBody { keys })
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("blob delete failed: {e}")))?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }
        Ok(())
    }

    async fn fetch(&self, url: &str) -> StoreResult<Vec<u8>> {
        let response = self
            .request(Method::GET, url.to_string())
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("blob fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(reject(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Network(format!("blob read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}
