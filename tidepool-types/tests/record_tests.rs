use tidepool_types::{mime_for_path, FileKind, FileRecord};

// ── Constructors ──────────────────────────────────────────────────

#[test]
fn file_record_size_counts_bytes() {
    let record = FileRecord::file("/a.txt", "héllo");
    assert_eq!(record.kind, FileKind::File);
    assert_eq!(record.size, 6); // é is two bytes
    assert_eq!(record.content.as_deref(), Some("héllo"));
    assert!(record.hash.is_none());
}

#[test]
fn binary_record_has_no_content() {
    let record = FileRecord::binary("/logo.png", 2048);
    assert_eq!(record.kind, FileKind::File);
    assert!(record.content.is_none());
    assert_eq!(record.size, 2048);
}

#[test]
fn folder_record() {
    let record = FileRecord::folder("/src");
    assert_eq!(record.kind, FileKind::Folder);
    assert!(!record.is_file());
    assert_eq!(record.size, 0);
}

#[test]
fn is_file_distinguishes_kinds() {
    assert!(FileRecord::file("/a", "x").is_file());
    assert!(!FileRecord::folder("/b").is_file());
}

// ── Serde ─────────────────────────────────────────────────────────

#[test]
fn kind_serializes_lowercase() {
    let json = serde_json::to_string(&FileKind::Folder).unwrap();
    assert_eq!(json, "\"folder\"");
    let json = serde_json::to_string(&FileKind::File).unwrap();
    assert_eq!(json, "\"file\"");
}

// ── MIME classification ───────────────────────────────────────────

#[test]
fn mime_for_common_extensions() {
    assert_eq!(mime_for_path("/src/app.tsx"), "text/typescript");
    assert_eq!(mime_for_path("/index.html"), "text/html");
    assert_eq!(mime_for_path("/styles/site.css"), "text/css");
    assert_eq!(mime_for_path("/data/config.json"), "application/json");
    assert_eq!(mime_for_path("/assets/logo.png"), "image/png");
    assert_eq!(mime_for_path("/assets/photo.JPG"), "image/jpeg");
}

#[test]
fn mime_for_unknown_extension_is_octet_stream() {
    assert_eq!(mime_for_path("/blob.xyz"), "application/octet-stream");
}

#[test]
fn mime_for_extensionless_names() {
    assert_eq!(mime_for_path("/Dockerfile"), "text/plain");
    assert_eq!(mime_for_path("/Makefile"), "text/plain");
    assert_eq!(mime_for_path("/.gitignore"), "text/plain");
    assert_eq!(mime_for_path("/mystery"), "application/octet-stream");
}
