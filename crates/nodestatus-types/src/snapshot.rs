//! The public snapshot broadcast to viewers.

use serde::{Serialize, Serializer};
use std::sync::Arc;

use crate::record::ServerEntry;

/// Immutable view of all server entries, sorted by id descending.
///
/// Cloning is cheap; a new snapshot is built whenever the underlying state
/// changes and is never patched in place.
#[derive(Debug, Clone)]
pub struct PublicSnapshot {
    servers: Arc<[ServerEntry]>,
}

impl Default for PublicSnapshot {
    fn default() -> Self {
        Self::from_entries(Vec::new())
    }
}

impl PublicSnapshot {
    /// Builds a snapshot from entries in their natural map order.
    ///
    /// Entries are sorted by id descending. The sort is stable, so entries
    /// sharing an id keep their input order.
    pub fn from_entries(mut entries: Vec<ServerEntry>) -> Self {
        entries.sort_by(|a, b| b.record.id.cmp(&a.record.id));
        Self {
            servers: entries.into(),
        }
    }

    /// Returns the sorted entries.
    pub fn entries(&self) -> &[ServerEntry] {
        &self.servers
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Returns whether the snapshot has no entries.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Number of entries whose status reports the node online.
    pub fn online_count(&self) -> usize {
        self.servers.iter().filter(|e| e.is_online()).count()
    }
}

impl Serialize for PublicSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.servers.as_ref().serialize(serializer)
    }
}

/// Frame pushed to viewers: `{"servers": [...], "updated": <unix seconds>}`.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotFrame {
    pub servers: PublicSnapshot,
    pub updated: u64,
}

impl SnapshotFrame {
    /// Wraps a snapshot with the current Unix time.
    pub fn now(servers: PublicSnapshot) -> Self {
        Self {
            servers,
            updated: crate::unix_now(),
        }
    }
}
