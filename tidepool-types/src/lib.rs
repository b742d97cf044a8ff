//! Core type definitions for Tidepool.
//!
//! This crate defines the fundamental, transport-agnostic types used
//! throughout the sync and recovery engine:
//! - Project identifiers (UUID v7)
//! - Content hashes (SHA-256, hex-encoded on the wire)
//! - File records produced by walking an ephemeral project tree
//! - The per-project manifest (canonical path → hash map plus counters)
//! - MIME classification for upload routing
//!
//! Everything here is pure data: no I/O, no async, no logging.

mod hash;
mod ids;
mod manifest;
mod mime;
mod record;

pub use hash::ContentHash;
pub use ids::ProjectId;
pub use manifest::Manifest;
pub use mime::mime_for_path;
pub use record::{FileKind, FileRecord};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),
}
