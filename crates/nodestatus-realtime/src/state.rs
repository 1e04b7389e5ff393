//! In-memory node state: registry records merged with live status.

use nodestatus_types::{NodeDirectory, NodeRecord, PublicSnapshot, ServerEntry, StatusSample};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::context::ConnectionId;
use crate::error::RegistryError;
use crate::registry::RegistryClient;

/// One node's slot in the store.
#[derive(Debug)]
struct Slot {
    record: NodeRecord,
    status: StatusSample,
    /// Connection currently streaming status for this node.
    session: Option<ConnectionId>,
}

impl Slot {
    fn new(record: NodeRecord) -> Self {
        Self {
            record,
            status: StatusSample::empty(),
            session: None,
        }
    }
}

/// Why a session could not be bound to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindRejection {
    /// The username has no entry.
    UnknownServer,
    /// Another connection already streams for this username.
    SessionActive,
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Entries created for newly enabled usernames.
    pub added: usize,
    /// Entries dropped because the username is gone or disabled.
    pub removed: usize,
    /// Entries remaining after the pass.
    pub total: usize,
}

impl ReconcileSummary {
    /// Returns whether the set of usernames changed.
    pub fn changed(&self) -> bool {
        self.added > 0 || self.removed > 0
    }
}

/// Thread-safe map of username to merged record and live status.
///
/// Every mutation rebuilds the [`PublicSnapshot`] before releasing the entry
/// lock, so readers always observe a snapshot that matches some consistent
/// state of the map.
#[derive(Debug, Default)]
pub struct StateStore {
    slots: RwLock<BTreeMap<String, Slot>>,
    snapshot: RwLock<PublicSnapshot>,
}

impl StateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a full registry listing into the store.
    ///
    /// New usernames get an entry with empty status, usernames missing from
    /// `directory` are removed, and surviving entries take the registry's
    /// current record fields while keeping their status.
    pub fn reconcile(&self, directory: &NodeDirectory) -> ReconcileSummary {
        let mut slots = self.slots.write();

        let before = slots.len();
        slots.retain(|username, _| directory.contains_key(username));
        let removed = before - slots.len();

        let mut added = 0;
        for (username, record) in directory {
            match slots.get_mut(username) {
                Some(slot) => slot.record = record.clone(),
                None => {
                    slots.insert(username.clone(), Slot::new(record.clone()));
                    added += 1;
                }
            }
        }

        let summary = ReconcileSummary {
            added,
            removed,
            total: slots.len(),
        };
        self.publish(&slots);
        summary
    }

    /// Reconciles a single username against its registry lookup.
    ///
    /// `Some(record)` inserts or refreshes the entry (status kept), `None`
    /// removes it.
    pub fn reconcile_one(&self, username: &str, lookup: Option<NodeRecord>) {
        let mut slots = self.slots.write();
        match lookup {
            Some(record) => match slots.get_mut(username) {
                Some(slot) => slot.record = record,
                None => {
                    slots.insert(username.to_string(), Slot::new(record));
                }
            },
            None => {
                if slots.remove(username).is_some() {
                    info!(username = %username, "Server removed from state");
                }
            }
        }
        self.publish(&slots);
    }

    /// Replaces the live status of `username` on behalf of `conn`.
    ///
    /// Returns `false` (and changes nothing) if the username is unknown. The
    /// write is also dropped unless `conn` is the session bound to the entry.
    /// A socket whose entry was removed and re-created by a reconciliation is
    /// detached and can no longer mark the node online.
    pub fn set_status_for(&self, username: &str, conn: &ConnectionId, sample: StatusSample) -> bool {
        let mut slots = self.slots.write();
        let Some(slot) = slots.get_mut(username) else {
            debug!(username = %username, "Status update for unknown server dropped");
            return false;
        };
        if slot.session.as_ref() != Some(conn) {
            debug!(username = %username, client_id = %conn, "Status update from detached session dropped");
            return false;
        }
        slot.status = sample;
        self.publish(&slots);
        true
    }

    /// Marks `conn` as the active session for `username`.
    pub fn bind_session(&self, username: &str, conn: &ConnectionId) -> Result<(), BindRejection> {
        let mut slots = self.slots.write();
        let slot = slots
            .get_mut(username)
            .ok_or(BindRejection::UnknownServer)?;
        if slot.session.is_some() || !slot.status.is_empty() {
            return Err(BindRejection::SessionActive);
        }
        slot.session = Some(conn.clone());
        Ok(())
    }

    /// Ends `conn`'s session for `username` and resets its status to empty.
    ///
    /// Does nothing if `conn` is not the bound session, e.g. because the entry
    /// was removed and re-created by a reconciliation in the meantime.
    pub fn release_session(&self, username: &str, conn: &ConnectionId) -> bool {
        let mut slots = self.slots.write();
        let Some(slot) = slots.get_mut(username) else {
            return false;
        };
        if slot.session.as_ref() != Some(conn) {
            return false;
        }
        slot.session = None;
        slot.status = StatusSample::empty();
        self.publish(&slots);
        true
    }

    /// Returns whether `username` has a live session, either a bound
    /// connection or a non-empty status.
    pub fn has_active_session(&self, username: &str) -> bool {
        self.slots
            .read()
            .get(username)
            .is_some_and(|slot| slot.session.is_some() || !slot.status.is_empty())
    }

    /// Returns the current public snapshot.
    pub fn public_snapshot(&self) -> PublicSnapshot {
        self.snapshot.read().clone()
    }

    /// Returns whether `username` has an entry.
    pub fn contains(&self, username: &str) -> bool {
        self.slots.read().contains_key(username)
    }

    /// Returns the record of `username`.
    pub fn record(&self, username: &str) -> Option<NodeRecord> {
        self.slots.read().get(username).map(|s| s.record.clone())
    }

    /// Returns the live status of `username`.
    pub fn status(&self, username: &str) -> Option<StatusSample> {
        self.slots.read().get(username).map(|s| s.status.clone())
    }

    /// All usernames, in order.
    pub fn usernames(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Pulls the full listing from `registry` and reconciles against it.
    ///
    /// Registry errors are returned untouched; retrying is up to the caller.
    pub async fn refresh(
        &self,
        registry: &dyn RegistryClient,
    ) -> Result<ReconcileSummary, RegistryError> {
        let directory = registry.list_enabled_servers().await?;
        Ok(self.reconcile(&directory))
    }

    /// Pulls the listing from `registry` and reconciles only `username`.
    ///
    /// Returns whether the username has an entry afterwards.
    pub async fn refresh_one(
        &self,
        registry: &dyn RegistryClient,
        username: &str,
    ) -> Result<bool, RegistryError> {
        let mut directory = registry.list_enabled_servers().await?;
        let lookup = directory.remove(username);
        let present = lookup.is_some();
        self.reconcile_one(username, lookup);
        Ok(present)
    }

    fn publish(&self, slots: &BTreeMap<String, Slot>) {
        let entries = slots
            .values()
            .map(|slot| ServerEntry {
                record: slot.record.clone(),
                status: slot.status.clone(),
            })
            .collect();
        *self.snapshot.write() = PublicSnapshot::from_entries(entries);
    }
}
