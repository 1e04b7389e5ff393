//! Temporary address bans with automatic expiry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::hooks::HookDispatcher;

/// A ban currently in force.
#[derive(Debug)]
struct BanRecord {
    /// When the ban lapses.
    until: Instant,
    /// Why the address was banned.
    reason: String,
    /// Task that removes this record once `until` passes.
    expiry: JoinHandle<()>,
}

type BanMap = Mutex<HashMap<String, BanRecord>>;

/// Tracks temporarily blocked source addresses.
///
/// Bans are address-scoped and process-lifetime only. Must be used from
/// within a tokio runtime, since each ban schedules its own expiry task.
#[derive(Debug)]
pub struct BanStore {
    bans: Arc<BanMap>,
    hooks: HookDispatcher,
}

impl BanStore {
    /// Creates an empty ban store reporting to the given hooks.
    pub fn new(hooks: HookDispatcher) -> Self {
        Self {
            bans: Arc::new(Mutex::new(HashMap::new())),
            hooks,
        }
    }

    /// Bans `address` for `ttl_secs` seconds.
    ///
    /// Returns `false` without touching the existing ban if the address is
    /// already banned: the first ban wins and is never extended. A lapsed
    /// record whose expiry task has not run yet is replaced.
    pub fn ban(&self, address: &str, ttl_secs: u64, reason: &str) -> bool {
        let ttl = Duration::from_secs(ttl_secs);
        {
            let mut bans = self.bans.lock();
            if bans
                .get(address)
                .is_some_and(|ban| Instant::now() < ban.until)
            {
                return false;
            }
            if let Some(stale) = bans.remove(address) {
                stale.expiry.abort();
            }
            let expiry = spawn_expiry(Arc::downgrade(&self.bans), address.to_string(), ttl);
            bans.insert(
                address.to_string(),
                BanRecord {
                    until: Instant::now() + ttl,
                    reason: reason.to_string(),
                    expiry,
                },
            );
        }

        warn!(
            address = %address,
            seconds = ttl_secs,
            reason = %reason,
            "Address banned"
        );
        self.hooks.server_banned(address, reason);
        true
    }

    /// Returns whether `address` is currently banned.
    pub fn is_banned(&self, address: &str) -> bool {
        self.bans
            .lock()
            .get(address)
            .is_some_and(|ban| Instant::now() < ban.until)
    }

    /// Returns the reason of an active ban.
    pub fn reason(&self, address: &str) -> Option<String> {
        self.bans
            .lock()
            .get(address)
            .filter(|ban| Instant::now() < ban.until)
            .map(|ban| ban.reason.clone())
    }

    /// Returns how long the ban on `address` still lasts.
    pub fn remaining(&self, address: &str) -> Option<Duration> {
        let now = Instant::now();
        self.bans
            .lock()
            .get(address)
            .and_then(|ban| ban.until.checked_duration_since(now))
            .filter(|left| !left.is_zero())
    }

    /// Number of bans currently recorded.
    pub fn len(&self) -> usize {
        self.bans.lock().len()
    }

    /// Returns whether no address is banned.
    pub fn is_empty(&self) -> bool {
        self.bans.lock().is_empty()
    }
}

impl Drop for BanStore {
    fn drop(&mut self) {
        for ban in self.bans.lock().values() {
            ban.expiry.abort();
        }
    }
}

fn spawn_expiry(bans: Weak<BanMap>, address: String, ttl: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        if let Some(bans) = bans.upgrade() {
            let mut bans = bans.lock();
            // Only a lapsed record; a newer ban keeps its own timer.
            if bans
                .get(&address)
                .is_some_and(|ban| ban.until <= Instant::now())
            {
                bans.remove(&address);
                debug!(address = %address, "Ban expired");
            }
        }
    })
}
