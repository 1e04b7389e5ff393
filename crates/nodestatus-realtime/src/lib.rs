//! # NodeStatus Real-time
//!
//! Real-time core of the NodeStatus server-monitoring hub.
//!
//! Monitored nodes connect over a WebSocket, authenticate once with a
//! MessagePack-encoded `{username, password}` map and then stream status
//! samples. Viewers connect over a second WebSocket and receive a JSON
//! snapshot of every enabled node on a fixed interval.
//!
//! ## Features
//!
//! - **Auth gate**: one-shot credential check with per-address temporary bans
//! - **State store**: per-node live status, reconciled against the registry
//! - **Push scheduler**: independent snapshot timer per viewer
//! - **Hooks**: optional observers for connect, ban and disconnect events
//!
//! ## Node channel
//!
//! ```text
//! server ─► "Authentication required"
//! node   ─► msgpack {"username": "...", "password": "..."}
//! server ─► "Authentication successful. Access granted."
//! server ─► "You are connecting via: IPv4"
//! node   ─► msgpack {"online4": true, "cpu": 3.5, ...}   (repeated)
//! ```
//!
//! ## Viewer channel
//!
//! ```json
//! {"servers": [{"id": 2, "name": "beta", "type": "kvm", "location": "Paris",
//!               "region": "FR", "status": {"online4": true}}],
//!  "updated": 1700000000}
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 NodeStatus                    │
//! │  ┌──────────┐   ┌────────────┐  ┌─────────┐  │
//! │  │ AuthGate │──►│ StateStore │◄─│ Push    │  │
//! │  └────┬─────┘   └─────▲──────┘  │Scheduler│  │
//! │       │               │         └─────────┘  │
//! │  ┌────▼─────┐   ┌─────┴──────┐               │
//! │  │ BanStore │   │ Registry   │ (reconciler)  │
//! │  └──────────┘   └────────────┘               │
//! └──────────────────────────────────────────────┘
//! ```

pub mod ban;
pub mod client;
pub mod context;
pub mod error;
pub mod gate;
pub mod hooks;
pub mod push;
pub mod registry;
pub mod service;
pub mod state;

// Re-export main types
pub use ban::BanStore;
pub use client::{create_client, Client, ClientReceiver, OutboundFrame};
pub use context::{resolve_source_address, AddressFamily, ConnectionContext, ConnectionId};
pub use error::{RealtimeError, RegistryError, Result};
pub use gate::{notice, AuthGate};
pub use hooks::{HookDispatcher, HookError, HookResult, NotificationHook};
pub use push::{push_snapshot, PushConfig, PushHandle, PushScheduler, DEFAULT_PUSH_INTERVAL};
pub use registry::RegistryClient;
pub use service::{NodeStatus, NodeStatusBuilder};
pub use state::{BindRejection, ReconcileSummary, StateStore};
