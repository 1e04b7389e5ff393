//! Notification hooks for node lifecycle events.
//!
//! Hooks are optional observers. Every callback defaults to a no-op, and
//! [`HookDispatcher`] runs each invocation on its own task so that a failing
//! or panicking hook is logged and never reaches the connection logic.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, warn};

use crate::context::ConnectionContext;

/// Error returned by a hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by hook callbacks.
pub type HookResult = std::result::Result<(), HookError>;

/// Receiver of node lifecycle events.
#[async_trait]
pub trait NotificationHook: Send + Sync + 'static {
    /// A socket opened on the node channel and is about to authenticate.
    async fn on_server_connect(&self, _conn: &ConnectionContext) -> HookResult {
        Ok(())
    }

    /// An address was banned.
    async fn on_server_banned(&self, _address: &str, _reason: &str) -> HookResult {
        Ok(())
    }

    /// A node authenticated and is now streaming status.
    async fn on_server_connected(&self, _conn: &ConnectionContext, _username: &str) -> HookResult {
        Ok(())
    }

    /// An authenticated node's socket closed.
    async fn on_server_disconnected(
        &self,
        _conn: &ConnectionContext,
        _username: &str,
    ) -> HookResult {
        Ok(())
    }
}

/// Fans lifecycle events out to the registered hooks.
#[derive(Clone, Default)]
pub struct HookDispatcher {
    hooks: Arc<Vec<Arc<dyn NotificationHook>>>,
}

impl HookDispatcher {
    /// Creates a dispatcher with no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher over the given hooks.
    pub fn with_hooks(hooks: Vec<Arc<dyn NotificationHook>>) -> Self {
        Self {
            hooks: Arc::new(hooks),
        }
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns whether no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn server_connect(&self, conn: &ConnectionContext) {
        for hook in self.hooks.iter().cloned() {
            let conn = conn.clone();
            spawn_isolated("on_server_connect", async move {
                hook.on_server_connect(&conn).await
            });
        }
    }

    pub fn server_banned(&self, address: &str, reason: &str) {
        for hook in self.hooks.iter().cloned() {
            let address = address.to_string();
            let reason = reason.to_string();
            spawn_isolated("on_server_banned", async move {
                hook.on_server_banned(&address, &reason).await
            });
        }
    }

    pub fn server_connected(&self, conn: &ConnectionContext, username: &str) {
        for hook in self.hooks.iter().cloned() {
            let conn = conn.clone();
            let username = username.to_string();
            spawn_isolated("on_server_connected", async move {
                hook.on_server_connected(&conn, &username).await
            });
        }
    }

    pub fn server_disconnected(&self, conn: &ConnectionContext, username: &str) {
        for hook in self.hooks.iter().cloned() {
            let conn = conn.clone();
            let username = username.to_string();
            spawn_isolated("on_server_disconnected", async move {
                hook.on_server_disconnected(&conn, &username).await
            });
        }
    }
}

impl std::fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookDispatcher")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Runs a hook invocation on its own task and logs its outcome.
fn spawn_isolated<F>(name: &'static str, invocation: F)
where
    F: Future<Output = HookResult> + Send + 'static,
{
    let task = tokio::spawn(invocation);
    tokio::spawn(async move {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(hook = name, error = %e, "Notification hook failed"),
            Err(e) if e.is_panic() => error!(hook = name, "Notification hook panicked"),
            Err(_) => {}
        }
    });
}
