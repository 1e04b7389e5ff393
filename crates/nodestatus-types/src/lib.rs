//! Common types used throughout `nodestatus`.
//!
//! This crate provides the data model shared by the real-time core and the
//! server binary: registry records, live status samples reported by nodes,
//! and the sorted public snapshot broadcast to dashboard viewers.

mod record;
mod snapshot;
mod status;

pub use record::{NodeDirectory, NodeRecord, ServerEntry};
pub use snapshot::{PublicSnapshot, SnapshotFrame};
pub use status::{StatusReport, StatusSample};

/// Returns the current Unix time in whole seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
