//! Sync and recovery engine for ephemeral Tidepool project trees.
//!
//! The project filesystem lives in the browser sandbox and evaporates with
//! the tab; this crate keeps a durable remote copy and rebuilds the tree
//! from it on the next visit. The moving parts:
//!
//! - [`walk`]: flattens the project tree into file records, pruning
//!   dependency and build directories
//! - [`detect`]: diffs the records against the stored manifest to find
//!   changed and deleted paths
//! - [`upload`]: pushes changes over the dual text/blob route and replaces
//!   the manifest wholesale
//! - [`restore`]: materializes the remote snapshot onto an empty tree
//! - [`SyncEngine`]: binds the above to one project's filesystem and stores
//! - [`SyncScheduler`]: debounces change notifications and runs at most one
//!   pass per project at a time
//!
//! ```
//! use std::sync::Arc;
//!
//! use tidepool_store::{MemoryBlobStore, MemoryStore};
//! use tidepool_sync::{SyncEngine, SyncScheduler};
//! use tidepool_types::ProjectId;
//! use tidepool_vfs::MemoryFs;
//!
//! let engine = SyncEngine::new(
//!     ProjectId::new(),
//!     Arc::new(MemoryFs::new()),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryBlobStore::new()),
//! );
//! let scheduler = SyncScheduler::new();
//! # drop((engine, scheduler));
//! ```

mod detect;
mod engine;
mod error;
mod restore;
mod scheduler;
mod uploader;
mod walker;

pub use detect::{ChangeSet, IndexEntry, detect};
pub use engine::{SyncConfig, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use restore::restore;
pub use scheduler::{DEBOUNCE_WINDOW, SyncEvent, SyncPhase, SyncScheduler};
pub use uploader::{SyncOutcome, TEXT_SIZE_LIMIT, UPLOAD_BATCH_SIZE, upload};
pub use walker::{EXCLUDED_DIRS, walk};
