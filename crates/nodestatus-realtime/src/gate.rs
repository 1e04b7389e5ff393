//! Authentication gate for the node channel.
//!
//! A node socket goes through exactly one authentication attempt:
//!
//! ```text
//! bind ──► "Authentication required" ──► first message
//!   ├─ address banned            ──► banned notice, inert
//!   ├─ undecodable credentials   ──► ban 120s, close
//!   ├─ blank username/password   ──► ban 60s, inert
//!   ├─ username already in use   ──► ban 120s, inert
//!   ├─ registry rejects          ──► ban 60s, inert
//!   └─ accepted                  ──► streaming status until close
//! ```
//!
//! Inert sockets stay open; their messages are read and dropped.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use nodestatus_types::StatusSample;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::ban::BanStore;
use crate::client::Client;
use crate::hooks::HookDispatcher;
use crate::registry::RegistryClient;
use crate::state::{BindRejection, StateStore};

/// Human-readable notices sent over the node channel.
pub mod notice {
    pub const AUTH_REQUIRED: &str = "Authentication required";
    pub const BANNED: &str = "You are banned. Please try to connect after 60 / 120 seconds";
    pub const CHECK_DETAILS: &str = "Please check your login details.";
    pub const BLANK: &str = "Username or password must not be blank.";
    pub const DUPLICATE: &str = "Only one connection per user allowed.";
    pub const WRONG_CREDENTIALS: &str = "Wrong username and/or password.";
    pub const GRANTED: &str = "Authentication successful. Access granted.";
}

pub const MALFORMED_BAN_SECS: u64 = 120;
pub const BLANK_BAN_SECS: u64 = 60;
pub const DUPLICATE_BAN_SECS: u64 = 120;
pub const BAD_CREDENTIALS_BAN_SECS: u64 = 60;

/// First message of the node channel.
#[derive(Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

/// Decodes the first node message.
///
/// Only a MessagePack map with string `username` and `password` fields is
/// accepted. Positional (array) encodings are rejected.
fn decode_credentials(payload: &[u8]) -> crate::error::Result<Credentials> {
    let fields: serde_json::Map<String, serde_json::Value> = rmp_serde::from_slice(payload)?;
    Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
}

/// Result of the one authentication attempt.
#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Granted(String),
    /// Rejected; the socket stays open but inert.
    Rejected,
    /// Rejected and the socket was asked to close.
    Closed,
}

/// Runs the node-channel handshake and binds accepted sockets to their state
/// entry.
pub struct AuthGate {
    state: Arc<StateStore>,
    bans: Arc<BanStore>,
    registry: Arc<dyn RegistryClient>,
    hooks: HookDispatcher,
}

impl AuthGate {
    /// Creates a gate.
    pub fn new(
        state: Arc<StateStore>,
        bans: Arc<BanStore>,
        registry: Arc<dyn RegistryClient>,
        hooks: HookDispatcher,
    ) -> Self {
        Self {
            state,
            bans,
            registry,
            hooks,
        }
    }

    /// Drives one node socket from bind to close.
    ///
    /// `inbound` yields the payload of every message the peer sends and ends
    /// when the socket closes. Outbound notices go through `client`.
    pub async fn serve<S>(&self, client: Arc<Client>, mut inbound: S)
    where
        S: Stream<Item = Bytes> + Unpin,
    {
        let conn = &client.context;
        let _ = client.send(notice::AUTH_REQUIRED);
        self.hooks.server_connect(conn);
        info!(address = %conn.address, client_id = %client.id, "Node is trying to connect");

        let Some(first) = inbound.next().await else {
            debug!(client_id = %client.id, "Node left before authenticating");
            return;
        };

        // Anything the peer sends while the first message is being checked is
        // dropped, so only the first message ever counts as credentials.
        let mut open = true;
        let verdict = {
            let attempt = self.authenticate(&client, &first);
            tokio::pin!(attempt);
            loop {
                tokio::select! {
                    verdict = &mut attempt => break verdict,
                    next = inbound.next(), if open => match next {
                        Some(_) => debug!(client_id = %client.id, "Ignoring message sent during authentication"),
                        None => open = false,
                    },
                }
            }
        };

        match verdict {
            Verdict::Granted(username) => {
                if open {
                    self.stream_status(&client, &username, &mut inbound).await;
                }
                self.state.release_session(&username, &client.id);
                warn!(address = %conn.address, username = %username, "Node disconnected");
                self.hooks.server_disconnected(conn, &username);
            }
            Verdict::Rejected if open => {
                while inbound.next().await.is_some() {
                    debug!(client_id = %client.id, "Ignoring message on rejected socket");
                }
            }
            Verdict::Rejected | Verdict::Closed => {}
        }
    }

    async fn authenticate(&self, client: &Client, payload: &[u8]) -> Verdict {
        let address = client.context.address.as_str();

        if self.bans.is_banned(address) {
            let _ = client.send(notice::BANNED);
            return Verdict::Rejected;
        }

        let credentials = match decode_credentials(payload) {
            Ok(credentials) => credentials,
            Err(e) => {
                debug!(address = %address, error = %e, "Undecodable credentials");
                self.bans
                    .ban(address, MALFORMED_BAN_SECS, "malformed credentials");
                let _ = client.send(notice::CHECK_DETAILS);
                client.close();
                return Verdict::Closed;
            }
        };

        let username = credentials.username.trim();
        let password = credentials.password.trim();

        if username.is_empty() || password.is_empty() {
            return self.reject(client, notice::BLANK, BLANK_BAN_SECS, "blank credential");
        }

        if self.state.has_active_session(username) {
            return self.reject(
                client,
                notice::DUPLICATE,
                DUPLICATE_BAN_SECS,
                "duplicate session",
            );
        }

        let accepted = match self.registry.authenticate(username, password).await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(username = %username, error = %e, "Registry authentication failed");
                false
            }
        };
        if !accepted {
            return self.reject(
                client,
                notice::WRONG_CREDENTIALS,
                BAD_CREDENTIALS_BAN_SECS,
                "bad credentials",
            );
        }

        match self.bind(username, client).await {
            Ok(()) => {}
            Err(BindRejection::SessionActive) => {
                return self.reject(
                    client,
                    notice::DUPLICATE,
                    DUPLICATE_BAN_SECS,
                    "duplicate session",
                );
            }
            Err(BindRejection::UnknownServer) => {
                return self.reject(
                    client,
                    notice::WRONG_CREDENTIALS,
                    BAD_CREDENTIALS_BAN_SECS,
                    "bad credentials",
                );
            }
        }

        let family = client.context.address_family();
        let _ = client.send(notice::GRANTED);
        let _ = client.send(format!("You are connecting via: {family}"));
        info!(
            address = %address,
            username = %username,
            family = %family,
            "Node has connected"
        );
        self.hooks.server_connected(&client.context, username);
        Verdict::Granted(username.to_string())
    }

    /// Binds the session, pulling the username from the registry first if the
    /// store has not seen it yet.
    async fn bind(&self, username: &str, client: &Client) -> Result<(), BindRejection> {
        match self.state.bind_session(username, &client.id) {
            Err(BindRejection::UnknownServer) => {
                match self.state.refresh_one(self.registry.as_ref(), username).await {
                    Ok(true) => self.state.bind_session(username, &client.id),
                    Ok(false) => Err(BindRejection::UnknownServer),
                    Err(e) => {
                        error!(username = %username, error = %e, "Registry lookup failed");
                        Err(BindRejection::UnknownServer)
                    }
                }
            }
            other => other,
        }
    }

    fn reject(&self, client: &Client, text: &str, ttl_secs: u64, reason: &str) -> Verdict {
        self.bans.ban(&client.context.address, ttl_secs, reason);
        let _ = client.send(text);
        Verdict::Rejected
    }

    async fn stream_status<S>(&self, client: &Client, username: &str, inbound: &mut S)
    where
        S: Stream<Item = Bytes> + Unpin,
    {
        while let Some(payload) = inbound.next().await {
            match rmp_serde::from_slice::<StatusSample>(&payload) {
                Ok(sample) => {
                    self.state.set_status_for(username, &client.id, sample);
                }
                Err(e) => {
                    debug!(client_id = %client.id, username = %username, error = %e, "Dropping undecodable status");
                }
            }
        }
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("state", &self.state)
            .field("bans", &self.bans)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
