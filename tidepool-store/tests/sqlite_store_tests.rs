use chrono::Utc;
use tidepool_store::{
    AssetRecord, BlobStore, ManifestGuard, ProjectStore, SqliteStore, StoreError, TextRecord,
};
use tidepool_types::{ContentHash, Manifest, ProjectId};

fn text_record(project: ProjectId, path: &str, content: &str) -> TextRecord {
    TextRecord {
        project_id: project,
        path: path.to_string(),
        content: content.to_string(),
        hash: ContentHash::of(content.as_bytes()),
        size: content.len() as u64,
        mime_type: "text/plain".to_string(),
    }
}

// ── Manifests ───────────────────────────────────────────────────

#[tokio::test]
async fn fetch_manifest_defaults_to_empty() {
    let store = SqliteStore::open_in_memory().unwrap();
    let project = ProjectId::new();

    let manifest = store.fetch_manifest(project).await.unwrap();
    assert_eq!(manifest.project_id, project);
    assert!(manifest.is_empty());
}

#[tokio::test]
async fn manifest_roundtrip_preserves_stamp() {
    let store = SqliteStore::open_in_memory().unwrap();
    let project = ProjectId::new();

    let mut manifest = Manifest::empty(project);
    manifest
        .entries
        .insert("/a.txt".to_string(), ContentHash::of(b"a"));
    manifest
        .entries
        .insert("/b.txt".to_string(), ContentHash::of(b"b"));
    manifest.total_files = 2;
    manifest.total_size = 2;
    manifest.last_sync_at = Some(Utc::now());

    store
        .commit_manifest(&manifest, ManifestGuard::Any)
        .await
        .unwrap();

    let fetched = store.fetch_manifest(project).await.unwrap();
    assert_eq!(fetched, manifest);
}

#[tokio::test]
async fn stale_guard_rejects_commit() {
    let store = SqliteStore::open_in_memory().unwrap();
    let project = ProjectId::new();

    let mut first = Manifest::empty(project);
    first.last_sync_at = Some(Utc::now());
    store
        .commit_manifest(&first, ManifestGuard::Any)
        .await
        .unwrap();

    let second = Manifest::empty(project);
    let result = store
        .commit_manifest(&second, ManifestGuard::LastSyncAt(None))
        .await;
    assert!(matches!(result, Err(StoreError::Conflict(_))));

    // Matching stamp goes through.
    store
        .commit_manifest(&second, ManifestGuard::LastSyncAt(first.last_sync_at))
        .await
        .unwrap();
}

// ── Rows ────────────────────────────────────────────────────────

#[tokio::test]
async fn text_rows_roundtrip() {
    let store = SqliteStore::open_in_memory().unwrap();
    let project = ProjectId::new();

    assert!(!store.text_exists(project, "/notes.md").await.unwrap());
    store
        .upsert_text(&text_record(project, "/notes.md", "# Notes"))
        .await
        .unwrap();
    assert!(store.text_exists(project, "/notes.md").await.unwrap());

    // Upsert replaces in place.
    store
        .upsert_text(&text_record(project, "/notes.md", "# Notes v2"))
        .await
        .unwrap();

    let snapshot = store.fetch_snapshot(project).await.unwrap().unwrap();
    assert_eq!(snapshot.files.len(), 1);
    assert_eq!(snapshot.files[0].content.as_deref(), Some("# Notes v2"));
}

#[tokio::test]
async fn asset_rows_roundtrip() {
    let store = SqliteStore::open_in_memory().unwrap();
    let project = ProjectId::new();

    assert!(store.asset_at(project, "/logo.png").await.unwrap().is_none());

    let record = AssetRecord {
        project_id: project,
        path: "/logo.png".to_string(),
        blob_url: "local://k1".to_string(),
        blob_key: "k1".to_string(),
        hash: ContentHash::of(b"pixels"),
        size: 6,
        mime_type: "image/png".to_string(),
    };
    store.upsert_asset(&record).await.unwrap();

    let fetched = store.asset_at(project, "/logo.png").await.unwrap().unwrap();
    assert_eq!(fetched, record);
}

#[tokio::test]
async fn delete_returns_orphaned_blob_keys() {
    let store = SqliteStore::open_in_memory().unwrap();
    let project = ProjectId::new();

    store
        .upsert_text(&text_record(project, "/a.txt", "a"))
        .await
        .unwrap();
    store
        .upsert_asset(&AssetRecord {
            project_id: project,
            path: "/logo.png".to_string(),
            blob_url: "local://k1".to_string(),
            blob_key: "k1".to_string(),
            hash: ContentHash::of(b"pixels"),
            size: 6,
            mime_type: "image/png".to_string(),
        })
        .await
        .unwrap();

    let orphaned = store
        .delete_paths(
            project,
            &["/a.txt".to_string(), "/logo.png".to_string(), "/ghost".to_string()],
        )
        .await
        .unwrap();

    assert_eq!(orphaned, vec!["k1".to_string()]);
    assert!(!store.text_exists(project, "/a.txt").await.unwrap());
    assert!(store.asset_at(project, "/logo.png").await.unwrap().is_none());
}

// ── Snapshots ───────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_missing_for_unknown_project() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.fetch_snapshot(ProjectId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn snapshot_merges_rows_and_derives_folders() {
    let store = SqliteStore::open_in_memory().unwrap();
    let project = ProjectId::new();

    store
        .upsert_text(&text_record(project, "/src/main.rs", "fn main() {}"))
        .await
        .unwrap();
    store
        .upsert_asset(&AssetRecord {
            project_id: project,
            path: "/assets/logo.png".to_string(),
            blob_url: "local://k1".to_string(),
            blob_key: "k1".to_string(),
            hash: ContentHash::of(b"pixels"),
            size: 6,
            mime_type: "image/png".to_string(),
        })
        .await
        .unwrap();

    let snapshot = store.fetch_snapshot(project).await.unwrap().unwrap();
    let paths: Vec<&str> = snapshot.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["/assets/logo.png", "/src/main.rs"]);
    assert_eq!(snapshot.folders, vec!["/assets", "/src"]);
    assert_eq!(snapshot.files[0].url.as_deref(), Some("local://k1"));
}

// ── Blobs ───────────────────────────────────────────────────────

#[tokio::test]
async fn blob_roundtrip_uses_local_urls() {
    let store = SqliteStore::open_in_memory().unwrap();
    let project = ProjectId::new();

    let handle = store
        .upload(project, "/logo.png", b"pixels", "image/png")
        .await
        .unwrap();
    assert!(handle.url.starts_with("local://"));
    assert_eq!(handle.url, format!("local://{}", handle.key));

    let bytes = store.fetch(&handle.url).await.unwrap();
    assert_eq!(bytes, b"pixels");

    store.delete(&[handle.key.clone()]).await.unwrap();
    assert!(matches!(
        store.fetch(&handle.url).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn blob_fetch_rejects_foreign_urls() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(matches!(
        store.fetch("https://elsewhere.example/blob").await,
        Err(StoreError::NotFound(_))
    ));
}

// ── Durability ──────────────────────────────────────────────────

#[tokio::test]
async fn rows_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    let path = path.to_str().unwrap();
    let project = ProjectId::new();

    {
        let store = SqliteStore::new(path).unwrap();
        store
            .upsert_text(&text_record(project, "/a.txt", "persisted"))
            .await
            .unwrap();
        let mut manifest = Manifest::empty(project);
        manifest
            .entries
            .insert("/a.txt".to_string(), ContentHash::of(b"persisted"));
        manifest.total_files = 1;
        manifest.total_size = 9;
        store
            .commit_manifest(&manifest, ManifestGuard::Any)
            .await
            .unwrap();
    }

    let reopened = SqliteStore::new(path).unwrap();
    assert!(reopened.text_exists(project, "/a.txt").await.unwrap());
    let manifest = reopened.fetch_manifest(project).await.unwrap();
    assert_eq!(manifest.total_files, 1);
    assert!(manifest.contains_path("/a.txt"));
}
