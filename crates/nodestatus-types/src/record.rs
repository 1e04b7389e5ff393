//! Registry records and merged server entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::status::StatusSample;

/// Enabled node records keyed by username, as returned by a registry.
pub type NodeDirectory = BTreeMap<String, NodeRecord>;

/// A node as described by the registry.
///
/// The username is not part of the record; it is the key under which the
/// record is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Numeric id, used for ordering the public snapshot.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Virtualization or hosting type (e.g. `kvm`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Free-form location label.
    pub location: String,
    /// Region code.
    pub region: String,
}

impl NodeRecord {
    /// Creates a record with the given id and name and empty descriptive fields.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: String::new(),
            location: String::new(),
            region: String::new(),
        }
    }

    /// Sets the type.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Sets the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }
}

/// A registry record merged with the node's live status.
///
/// Serializes flat: `{id, name, type, location, region, status}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
    /// Registry fields.
    #[serde(flatten)]
    pub record: NodeRecord,
    /// Last status reported over the node channel, empty when offline.
    #[serde(default)]
    pub status: StatusSample,
}

impl ServerEntry {
    /// Creates an entry with an empty status.
    pub fn new(record: NodeRecord) -> Self {
        Self {
            record,
            status: StatusSample::empty(),
        }
    }

    /// Returns whether the node currently reports itself online.
    pub fn is_online(&self) -> bool {
        self.status.is_online()
    }
}
