//! SQLite backend: the whole store in one local database file.
//!
//! Backs self-hosted and offline setups. Blob payloads live in the same
//! database under `local://` URLs, so [`SqliteStore`] implements both
//! [`ProjectStore`] and [`BlobStore`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tidepool_types::{ContentHash, FileKind, Manifest, ProjectId};
use uuid::Uuid;

use crate::records::{
    AssetRecord, BlobHandle, ProjectSnapshot, SnapshotFile, TextRecord, folder_prefixes,
};
use crate::store::{BlobStore, ManifestGuard, ProjectStore};
use crate::{StoreError, StoreResult};

/// Store backed by a single SQLite database.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn new(path: &str) -> StoreResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Storage(format!("failed to open project store: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StoreError::Storage(format!("failed to open in-memory project store: {e}"))
        })?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS manifests (
                project_id TEXT PRIMARY KEY,
                entries TEXT NOT NULL,
                total_files INTEGER NOT NULL,
                total_size INTEGER NOT NULL,
                last_sync_at TEXT
            );

            CREATE TABLE IF NOT EXISTS text_files (
                project_id TEXT NOT NULL,
                path TEXT NOT NULL,
                content TEXT NOT NULL,
                hash TEXT NOT NULL,
                size INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                UNIQUE(project_id, path)
            );

            CREATE TABLE IF NOT EXISTS asset_files (
                project_id TEXT NOT NULL,
                path TEXT NOT NULL,
                blob_url TEXT NOT NULL,
                blob_key TEXT NOT NULL,
                hash TEXT NOT NULL,
                size INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                UNIQUE(project_id, path)
            );

            CREATE TABLE IF NOT EXISTS blobs (
                key TEXT PRIMARY KEY,
                mime_type TEXT NOT NULL,
                content BLOB NOT NULL
            );
            ",
        )
        .map_err(|e| StoreError::Storage(format!("failed to initialize schema: {e}")))?;
        Ok(())
    }
}

fn parse_stamp(value: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    match value {
        Some(s) => Ok(Some(
            DateTime::parse_from_rfc3339(&s)
                .map_err(|e| StoreError::Storage(format!("invalid last_sync_at: {e}")))?
                .with_timezone(&Utc),
        )),
        None => Ok(None),
    }
}

fn load_manifest(conn: &Connection, project: ProjectId) -> StoreResult<Option<Manifest>> {
    let row = conn
        .query_row(
            "SELECT entries, total_files, total_size, last_sync_at FROM manifests WHERE project_id = ?1",
            params![project.to_string()],
            |row| {
                let entries: String = row.get(0)?;
                let total_files: i64 = row.get(1)?;
                let total_size: i64 = row.get(2)?;
                let last_sync_at: Option<String> = row.get(3)?;
                Ok((entries, total_files, total_size, last_sync_at))
            },
        )
        .optional()
        .map_err(|e| StoreError::Storage(format!("failed to load manifest: {e}")))?;

    let Some((entries_json, total_files, total_size, last_sync_at)) = row else {
        return Ok(None);
    };

    let entries: BTreeMap<String, ContentHash> = serde_json::from_str(&entries_json)?;
    Ok(Some(Manifest {
        project_id: project,
        entries,
        total_files: total_files as u64,
        total_size: total_size as u64,
        last_sync_at: parse_stamp(last_sync_at)?,
    }))
}

#[async_trait]
impl ProjectStore for SqliteStore {
    async fn fetch_manifest(&self, project: ProjectId) -> StoreResult<Manifest> {
        let conn = self.conn.lock().unwrap();
        Ok(load_manifest(&conn, project)?.unwrap_or_else(|| Manifest::empty(project)))
    }

    async fn commit_manifest(&self, manifest: &Manifest, guard: ManifestGuard) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        if let ManifestGuard::LastSyncAt(expected) = guard {
            let current =
                load_manifest(&conn, manifest.project_id)?.and_then(|m| m.last_sync_at);
            if current != expected {
                return Err(StoreError::Conflict(format!(
                    "manifest for {} changed since it was read",
                    manifest.project_id
                )));
            }
        }

        let entries_json = serde_json::to_string(&manifest.entries)?;
        conn.execute(
            "INSERT OR REPLACE INTO manifests (project_id, entries, total_files, total_size, last_sync_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                manifest.project_id.to_string(),
                entries_json,
                manifest.total_files as i64,
                manifest.total_size as i64,
                manifest.last_sync_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(|e| StoreError::Storage(format!("failed to save manifest: {e}")))?;
        Ok(())
    }

    async fn text_exists(&self, project: ProjectId, path: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let row: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM text_files WHERE project_id = ?1 AND path = ?2",
                params![project.to_string(), path],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Storage(format!("failed to probe text file: {e}")))?;
        Ok(row.is_some())
    }

    async fn upsert_text(&self, record: &TextRecord) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO text_files (project_id, path, content, hash, size, mime_type) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.project_id.to_string(),
                record.path,
                record.content,
                record.hash.to_hex(),
                record.size as i64,
                record.mime_type,
            ],
        )
        .map_err(|e| StoreError::Storage(format!("failed to save text file: {e}")))?;
        Ok(())
    }

    async fn asset_at(&self, project: ProjectId, path: &str) -> StoreResult<Option<AssetRecord>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT blob_url, blob_key, hash, size, mime_type FROM asset_files WHERE project_id = ?1 AND path = ?2",
                params![project.to_string(), path],
                |row| {
                    let blob_url: String = row.get(0)?;
                    let blob_key: String = row.get(1)?;
                    let hash: String = row.get(2)?;
                    let size: i64 = row.get(3)?;
                    let mime_type: String = row.get(4)?;
                    Ok((blob_url, blob_key, hash, size, mime_type))
                },
            )
            .optional()
            .map_err(|e| StoreError::Storage(format!("failed to load asset file: {e}")))?;

        let Some((blob_url, blob_key, hash, size, mime_type)) = row else {
            return Ok(None);
        };
        let hash = ContentHash::parse_hex(&hash)
            .map_err(|e| StoreError::Storage(format!("invalid hash for {path}: {e}")))?;
        Ok(Some(AssetRecord {
            project_id: project,
            path: path.to_string(),
            blob_url,
            blob_key,
            hash,
            size: size as u64,
            mime_type,
        }))
    }

    async fn upsert_asset(&self, record: &AssetRecord) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO asset_files (project_id, path, blob_url, blob_key, hash, size, mime_type) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.project_id.to_string(),
                record.path,
                record.blob_url,
                record.blob_key,
                record.hash.to_hex(),
                record.size as i64,
                record.mime_type,
            ],
        )
        .map_err(|e| StoreError::Storage(format!("failed to save asset file: {e}")))?;
        Ok(())
    }

    async fn delete_paths(&self, project: ProjectId, paths: &[String]) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let project_id = project.to_string();
        let mut orphaned = Vec::new();
        for path in paths {
            let key: Option<String> = conn
                .query_row(
                    "SELECT blob_key FROM asset_files WHERE project_id = ?1 AND path = ?2",
                    params![project_id, path],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StoreError::Storage(format!("failed to look up blob key: {e}")))?;
            if let Some(key) = key {
                orphaned.push(key);
            }

            conn.execute(
                "DELETE FROM text_files WHERE project_id = ?1 AND path = ?2",
                params![project_id, path],
            )
            .map_err(|e| StoreError::Storage(format!("failed to delete text file: {e}")))?;
            conn.execute(
                "DELETE FROM asset_files WHERE project_id = ?1 AND path = ?2",
                params![project_id, path],
            )
            .map_err(|e| StoreError::Storage(format!("failed to delete asset file: {e}")))?;
        }
        Ok(orphaned)
    }

    async fn fetch_snapshot(&self, project: ProjectId) -> StoreResult<Option<ProjectSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let project_id = project.to_string();
        let mut files: BTreeMap<String, SnapshotFile> = BTreeMap::new();

        let mut stmt = conn
            .prepare("SELECT path, content, hash, size FROM text_files WHERE project_id = ?1")
            .map_err(|e| StoreError::Storage(format!("failed to prepare text query: {e}")))?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                let path: String = row.get(0)?;
                let content: String = row.get(1)?;
                let hash: String = row.get(2)?;
                let size: i64 = row.get(3)?;
                Ok((path, content, hash, size))
            })
            .map_err(|e| StoreError::Storage(format!("failed to query text files: {e}")))?;
        for row in rows {
            let (path, content, hash, size) =
                row.map_err(|e| StoreError::Storage(format!("failed to read text row: {e}")))?;
            let hash = ContentHash::parse_hex(&hash)
                .map_err(|e| StoreError::Storage(format!("invalid hash for {path}: {e}")))?;
            files.insert(
                path.clone(),
                SnapshotFile {
                    path,
                    kind: FileKind::File,
                    content: Some(content),
                    url: None,
                    hash,
                    size: size as u64,
                },
            );
        }

        let mut stmt = conn
            .prepare("SELECT path, blob_url, hash, size FROM asset_files WHERE project_id = ?1")
            .map_err(|e| StoreError::Storage(format!("failed to prepare asset query: {e}")))?;
        let rows = stmt
            .query_map(params![project_id], |row| {
                let path: String = row.get(0)?;
                let blob_url: String = row.get(1)?;
                let hash: String = row.get(2)?;
                let size: i64 = row.get(3)?;
                Ok((path, blob_url, hash, size))
            })
            .map_err(|e| StoreError::Storage(format!("failed to query asset files: {e}")))?;
        for row in rows {
            let (path, blob_url, hash, size) =
                row.map_err(|e| StoreError::Storage(format!("failed to read asset row: {e}")))?;
            let hash = ContentHash::parse_hex(&hash)
                .map_err(|e| StoreError::Storage(format!("invalid hash for {path}: {e}")))?;
            files.insert(
                path.clone(),
                SnapshotFile {
                    path,
                    kind: FileKind::File,
                    content: None,
                    url: Some(blob_url),
                    hash,
                    size: size as u64,
                },
            );
        }

        let manifest = load_manifest(&conn, project)?;
        if files.is_empty() && manifest.is_none() {
            return Ok(None);
        }

        let folders = folder_prefixes(files.keys().map(String::as_str));
        Ok(Some(ProjectSnapshot {
            files: files.into_values().collect(),
            folders,
            manifest: manifest.unwrap_or_else(|| Manifest::empty(project)),
        }))
    }
}

#[async_trait]
impl BlobStore for SqliteStore {
    async fn upload(
        &self,
        project: ProjectId,
        _path: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> StoreResult<BlobHandle> {
        let key = format!("{project}/{}", Uuid::new_v4());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO blobs (key, mime_type, content) VALUES (?1, ?2, ?3)",
            params![key, mime_type, bytes],
        )
        .map_err(|e| StoreError::Storage(format!("failed to store blob: {e}")))?;
        Ok(BlobHandle {
            url: format!("local://{key}"),
            key,
        })
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        for key in keys {
            conn.execute("DELETE FROM blobs WHERE key = ?1", params![key])
                .map_err(|e| StoreError::Storage(format!("failed to delete blob: {e}")))?;
        }
        Ok(())
    }

    async fn fetch(&self, url: &str) -> StoreResult<Vec<u8>> {
        let key = url
            .strip_prefix("local://")
            .ok_or_else(|| StoreError::NotFound(format!("unrecognized blob url: {url}")))?;
        let conn = self.conn.lock().unwrap();
        let content: Option<Vec<u8>> = conn
            .query_row("SELECT content FROM blobs WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| StoreError::Storage(format!("failed to load blob: {e}")))?;
        content.ok_or_else(|| StoreError::NotFound(format!("no blob at {url}")))
    }
}
