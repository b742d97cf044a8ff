//! The per-project manifest: the canonical remote record of file identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ContentHash, ProjectId};

/// Canonical remote map of path → content hash for one project, plus
/// aggregate counters.
///
/// The manifest is the sole source of truth for "what does the remote believe
/// exists, and with what content." It is absent until the first successful
/// sync and replaced wholesale (never merged) at the end of every sync pass
/// that had at least one resolvable change. Entries live in a `BTreeMap` so
/// paths are unique by construction and serialization is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub project_id: ProjectId,
    pub entries: BTreeMap<String, ContentHash>,
    pub total_files: u64,
    pub total_size: u64,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl Manifest {
    /// The empty-default manifest for a project that has never synced.
    #[must_use]
    pub fn empty(project_id: ProjectId) -> Self {
        Self {
            project_id,
            entries: BTreeMap::new(),
            total_files: 0,
            total_size: 0,
            last_sync_at: None,
        }
    }

    /// Returns the recorded hash for a path, if the remote tracks it.
    #[must_use]
    pub fn hash_for(&self, path: &str) -> Option<&ContentHash> {
        self.entries.get(path)
    }

    /// True when the remote tracks the path.
    #[must_use]
    pub fn contains_path(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of tracked paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no paths are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
