//! # Observability Module
//!
//! Structured logging for the hub. HTTP requests are traced by the
//! `TraceLayer` installed in [`crate::gateway::create_router`].
//!
//! ```rust,no_run
//! use nodestatus_node::observability::init_logging;
//!
//! init_logging("info", false);
//! ```

mod logging;

pub use logging::{init_logging, LogFormat};
