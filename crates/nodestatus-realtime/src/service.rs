//! The owning service that wires the stores, the gate and the push scheduler.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::ban::BanStore;
use crate::client::Client;
use crate::error::Result;
use crate::gate::AuthGate;
use crate::hooks::{HookDispatcher, NotificationHook};
use crate::push::{PushConfig, PushHandle, PushScheduler};
use crate::registry::RegistryClient;
use crate::state::{ReconcileSummary, StateStore};

/// Builder for [`NodeStatus`].
pub struct NodeStatusBuilder {
    registry: Arc<dyn RegistryClient>,
    hooks: Vec<Arc<dyn NotificationHook>>,
    push: PushConfig,
}

impl NodeStatusBuilder {
    /// Registers a lifecycle hook.
    pub fn hook(mut self, hook: Arc<dyn NotificationHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Sets the push behaviour for viewers.
    pub fn push(mut self, config: PushConfig) -> Self {
        self.push = config;
        self
    }

    /// Builds the service. Must be called from within a tokio runtime.
    pub fn build(self) -> NodeStatus {
        let hooks = HookDispatcher::with_hooks(self.hooks);
        let state = Arc::new(StateStore::new());
        let bans = Arc::new(BanStore::new(hooks.clone()));
        let gate = Arc::new(AuthGate::new(
            Arc::clone(&state),
            Arc::clone(&bans),
            Arc::clone(&self.registry),
            hooks.clone(),
        ));
        let push = PushScheduler::new(Arc::clone(&state), self.push);

        NodeStatus {
            registry: self.registry,
            state,
            bans,
            hooks,
            gate,
            push,
        }
    }
}

/// Status aggregation service.
///
/// Cheap to share behind an `Arc`; every component is itself shared.
pub struct NodeStatus {
    registry: Arc<dyn RegistryClient>,
    state: Arc<StateStore>,
    bans: Arc<BanStore>,
    hooks: HookDispatcher,
    gate: Arc<AuthGate>,
    push: PushScheduler,
}

impl NodeStatus {
    /// Starts building a service backed by `registry`.
    pub fn builder(registry: Arc<dyn RegistryClient>) -> NodeStatusBuilder {
        NodeStatusBuilder {
            registry,
            hooks: Vec::new(),
            push: PushConfig::default(),
        }
    }

    /// Loads the registry listing into the state store.
    pub async fn init(&self) -> Result<ReconcileSummary> {
        let summary = self.state.refresh(self.registry.as_ref()).await?;
        info!(servers = summary.total, "Loaded servers from registry");
        Ok(summary)
    }

    /// Re-reads the registry every `every`, retrying on the next tick when
    /// the registry is unavailable.
    pub fn spawn_reconciler(&self, every: Duration) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; init already covered it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match state.refresh(registry.as_ref()).await {
                    Ok(summary) if summary.changed() => info!(
                        added = summary.added,
                        removed = summary.removed,
                        total = summary.total,
                        "Server list reconciled"
                    ),
                    Ok(_) => debug!("Server list unchanged"),
                    Err(e) => warn!(error = %e, "Registry unavailable, keeping current server list"),
                }
            }
        })
    }

    /// Handles a node-channel socket until it closes.
    pub async fn serve_node<S>(&self, client: Arc<Client>, inbound: S)
    where
        S: futures::Stream<Item = bytes::Bytes> + Unpin,
    {
        self.gate.serve(client, inbound).await
    }

    /// Registers a viewer socket for snapshot pushes.
    pub fn register_viewer(&self, viewer: Arc<Client>) -> PushHandle {
        self.push.register(viewer)
    }

    /// Re-pulls a single username from the registry, after it was created or
    /// edited there.
    pub async fn refresh_server(&self, username: &str) -> Result<bool> {
        Ok(self
            .state
            .refresh_one(self.registry.as_ref(), username)
            .await?)
    }

    /// Returns the state store.
    pub fn state(&self) -> &Arc<StateStore> {
        &self.state
    }

    /// Returns the ban store.
    pub fn bans(&self) -> &Arc<BanStore> {
        &self.bans
    }

    /// Returns the hook dispatcher.
    pub fn hooks(&self) -> &HookDispatcher {
        &self.hooks
    }

    /// Returns the push configuration.
    pub fn push_config(&self) -> &PushConfig {
        self.push.config()
    }
}

impl std::fmt::Debug for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStatus")
            .field("state", &self.state)
            .field("bans", &self.bans)
            .field("hooks", &self.hooks)
            .field("push", &self.push)
            .finish_non_exhaustive()
    }
}
