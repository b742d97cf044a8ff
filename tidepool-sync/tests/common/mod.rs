#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Once;

use tidepool_store::{MemoryBlobStore, MemoryStore};
use tidepool_sync::{SyncConfig, SyncEngine};
use tidepool_types::ProjectId;
use tidepool_vfs::MemoryFs;

static TRACING: Once = Once::new();

/// Route engine logs through the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// An engine wired to fresh in-memory backends, plus handles to every one
/// of them for seeding and inspection.
pub fn engine_fixture() -> (ProjectId, MemoryFs, MemoryStore, MemoryBlobStore, SyncEngine) {
    engine_fixture_with(SyncConfig::default())
}

pub fn engine_fixture_with(
    config: SyncConfig,
) -> (ProjectId, MemoryFs, MemoryStore, MemoryBlobStore, SyncEngine) {
    init_tracing();
    let project = ProjectId::new();
    let fs = MemoryFs::new();
    let store = MemoryStore::new();
    let blobs = MemoryBlobStore::new();
    let engine = SyncEngine::with_config(
        project,
        Arc::new(fs.clone()),
        Arc::new(store.clone()),
        Arc::new(blobs.clone()),
        config,
    );
    (project, fs, store, blobs, engine)
}
