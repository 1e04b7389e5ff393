//! # NodeStatus Node
//!
//! Server side of the NodeStatus hub.
//!
//! This crate wires the real-time core to the outside world: the axum
//! WebSocket gateway, the YAML server registry, webhook notifications,
//! configuration and logging.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      NodeStatus Hub                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │                   Gateway (axum)                      │  │
//! │  │  • /connect  node channel (msgpack in, text out)      │  │
//! │  │  • /public   viewer channel (JSON snapshots out)      │  │
//! │  │  • /health   liveness                                 │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                              │                              │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │              nodestatus-realtime                      │  │
//! │  │  • AuthGate, BanStore, StateStore, PushScheduler      │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                 │                          │                │
//! │  ┌──────────────────────────┐  ┌──────────────────────────┐ │
//! │  │  FileRegistry (YAML)     │  │  WebhookNotifier         │ │
//! │  └──────────────────────────┘  └──────────────────────────┘ │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! nodestatus hash-password 's3cret'      # paste into servers.yaml
//! nodestatus serve --config config.yaml
//! ```
//!
//! ## Modules
//!
//! - [`gateway`] - HTTP/WebSocket routes
//! - [`registry`] - YAML-file registry with Argon2 password hashes
//! - [`notify`] - Webhook notification hook
//! - [`config`] - Hub configuration
//! - [`observability`] - Logging setup

pub mod config;
pub mod gateway;
pub mod notify;
pub mod observability;
pub mod registry;

pub use config::{Config, ConfigError};
pub use gateway::{create_router, serve, AppState};
pub use notify::WebhookNotifier;
pub use registry::FileRegistry;
