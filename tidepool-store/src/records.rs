//! Durable row types and snapshot payloads shared by every backend.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tidepool_types::{ContentHash, FileKind, Manifest, ProjectId};

/// One stored text file, unique per (project, path). Content travels inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRecord {
    pub project_id: ProjectId,
    pub path: String,
    pub content: String,
    pub hash: ContentHash,
    pub size: u64,
    pub mime_type: String,
}

/// One stored binary file, unique per (project, path). Content lives in the
/// blob store; the record only carries the handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub project_id: ProjectId,
    pub path: String,
    pub blob_url: String,
    pub blob_key: String,
    pub hash: ContentHash,
    pub size: u64,
    pub mime_type: String,
}

/// Handle returned by a blob upload: a fetchable URL plus the storage key
/// used for later reclamation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobHandle {
    pub url: String,
    pub key: String,
}

/// One file inside a [`ProjectSnapshot`]: either inline text content or a
/// blob URL, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFile {
    pub path: String,
    pub kind: FileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub hash: ContentHash,
    pub size: u64,
}

impl SnapshotFile {
    pub fn from_text(record: &TextRecord) -> Self {
        Self {
            path: record.path.clone(),
            kind: FileKind::File,
            content: Some(record.content.clone()),
            url: None,
            hash: record.hash,
            size: record.size,
        }
    }

    pub fn from_asset(record: &AssetRecord) -> Self {
        Self {
            path: record.path.clone(),
            kind: FileKind::File,
            content: None,
            url: Some(record.blob_url.clone()),
            hash: record.hash,
            size: record.size,
        }
    }
}

/// Everything needed to rebuild a project on an empty filesystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub files: Vec<SnapshotFile>,
    pub folders: Vec<String>,
    pub manifest: Manifest,
}

/// Every proper ancestor folder of the given file paths, sorted so parents
/// precede children. `"/src/sync/mod.rs"` yields `"/src"` and `"/src/sync"`.
pub fn folder_prefixes<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut folders = BTreeSet::new();
    for path in paths {
        let mut end = path.len();
        while let Some(slash) = path[..end].rfind('/') {
            if slash == 0 {
                break;
            }
            folders.insert(path[..slash].to_string());
            end = slash;
        }
    }
    folders.into_iter().collect()
}
