//! Durable storage backends for Tidepool projects.
//!
//! A project's remote state is three tables (manifest, text rows, asset
//! rows) plus a blob service for binary payloads. The [`ProjectStore`] and
//! [`BlobStore`] traits cover those concerns; this crate ships three
//! backends:
//!
//! - [`HttpStore`] / [`HttpBlobStore`]: the hosted API
//! - [`SqliteStore`]: everything in one local database file
//! - [`MemoryStore`] / [`MemoryBlobStore`]: for tests and demos

mod error;
mod http;
mod memory;
mod records;
mod sqlite;
mod store;

pub use error::{StoreError, StoreResult};
pub use http::{HttpBlobStore, HttpStore, HttpStoreConfig};
pub use memory::{MemoryBlobStore, MemoryStore};
pub use records::{
    AssetRecord, BlobHandle, ProjectSnapshot, SnapshotFile, TextRecord, folder_prefixes,
};
pub use sqlite::SqliteStore;
pub use store::{BlobStore, ManifestGuard, ProjectStore};
