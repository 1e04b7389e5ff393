//! Periodic snapshot push to viewer connections.

use nodestatus_types::SnapshotFrame;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::client::Client;
use crate::error::Result;
use crate::state::StateStore;

/// Default interval between two pushes to the same viewer.
pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_millis(1500);

/// Push behaviour for viewer connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConfig {
    /// When `false`, viewers only receive the snapshot sent on registration.
    pub enabled: bool,
    /// Time between two scheduled pushes.
    pub interval: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_PUSH_INTERVAL,
        }
    }
}

/// Schedules snapshot pushes, one independent timer per viewer.
#[derive(Debug, Clone)]
pub struct PushScheduler {
    state: Arc<StateStore>,
    config: PushConfig,
}

impl PushScheduler {
    /// Creates a scheduler reading from `state`.
    pub fn new(state: Arc<StateStore>, config: PushConfig) -> Self {
        Self { state, config }
    }

    /// Returns the push configuration.
    pub fn config(&self) -> &PushConfig {
        &self.config
    }

    /// Registers a viewer: sends the current snapshot right away, then keeps
    /// pushing on every tick until the viewer goes away or the returned
    /// handle is dropped.
    pub fn register(&self, viewer: Arc<Client>) -> PushHandle {
        let state = Arc::clone(&self.state);
        let config = self.config.clone();
        let viewer_id = viewer.id.clone();

        let task = tokio::spawn(async move {
            if push_snapshot(&viewer, &state).is_err() {
                return;
            }
            if !config.enabled {
                return;
            }

            let mut ticker = tokio::time::interval_at(Instant::now() + config.interval, config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if push_snapshot(&viewer, &state).is_err() {
                    break;
                }
            }
            debug!(client_id = %viewer.id, "Push loop ended");
        });

        debug!(client_id = %viewer_id, "Viewer registered for push");
        PushHandle { task }
    }
}

/// Serializes the current snapshot and queues it for `viewer`.
pub fn push_snapshot(viewer: &Client, state: &StateStore) -> Result<()> {
    let frame = SnapshotFrame::now(state.public_snapshot());
    let json = serde_json::to_string(&frame)?;
    viewer.send(json)
}

/// Owns a viewer's push timer. Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct PushHandle {
    task: JoinHandle<()>,
}

impl PushHandle {
    /// Stops pushing to this viewer.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Returns whether the push loop has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
