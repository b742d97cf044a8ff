use pretty_assertions::assert_eq;
use tidepool_types::{ContentHash, Manifest, ProjectId};

fn make_manifest() -> Manifest {
    let mut manifest = Manifest::empty(ProjectId::new());
    manifest
        .entries
        .insert("/src/main.ts".to_string(), ContentHash::of(b"main"));
    manifest
        .entries
        .insert("/index.html".to_string(), ContentHash::of(b"index"));
    manifest.total_files = 2;
    manifest.total_size = 9;
    manifest
}

// ── Construction and lookup ───────────────────────────────────────

#[test]
fn empty_manifest_has_no_entries() {
    let manifest = Manifest::empty(ProjectId::new());
    assert!(manifest.is_empty());
    assert_eq!(manifest.len(), 0);
    assert_eq!(manifest.total_files, 0);
    assert_eq!(manifest.total_size, 0);
    assert!(manifest.last_sync_at.is_none());
}

#[test]
fn hash_for_returns_tracked_entry() {
    let manifest = make_manifest();
    assert_eq!(
        manifest.hash_for("/src/main.ts"),
        Some(&ContentHash::of(b"main"))
    );
    assert!(manifest.hash_for("/missing.txt").is_none());
}

#[test]
fn contains_path() {
    let manifest = make_manifest();
    assert!(manifest.contains_path("/index.html"));
    assert!(!manifest.contains_path("/other.html"));
}

// ── Serialization ─────────────────────────────────────────────────

#[test]
fn serializes_with_camel_case_fields() {
    let manifest = make_manifest();
    let json = serde_json::to_string(&manifest).unwrap();
    assert!(json.contains("\"projectId\""));
    assert!(json.contains("\"totalFiles\""));
    assert!(json.contains("\"totalSize\""));
    assert!(json.contains("\"lastSyncAt\""));
}

#[test]
fn serialization_is_deterministic() {
    let a = make_manifest();
    let b = a.clone();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn entries_serialize_in_path_order() {
    let manifest = make_manifest();
    let json = serde_json::to_string(&manifest).unwrap();
    let index_pos = json.find("/index.html").unwrap();
    let main_pos = json.find("/src/main.ts").unwrap();
    assert!(index_pos < main_pos);
}

#[test]
fn roundtrip_preserves_entries() {
    let manifest = make_manifest();
    let json = serde_json::to_string(&manifest).unwrap();
    let back: Manifest = serde_json::from_str(&json).unwrap();
    assert_eq!(manifest, back);
}
