//! Webhook delivery of node lifecycle events.

use async_trait::async_trait;
use nodestatus_realtime::{ConnectionContext, HookResult, NotificationHook};
use nodestatus_types::unix_now;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Event names carried in the `event` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventKind {
    ServerConnect,
    ServerBanned,
    ServerConnected,
    ServerDisconnected,
}

/// JSON body POSTed to the webhook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    pub event: WebhookEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    /// Unix seconds.
    pub timestamp: u64,
}

impl WebhookEvent {
    fn new(event: WebhookEventKind) -> Self {
        Self {
            event,
            username: None,
            address: None,
            reason: None,
            connection_id: None,
            timestamp: unix_now(),
        }
    }

    fn connection(event: WebhookEventKind, conn: &ConnectionContext) -> Self {
        Self {
            address: Some(conn.address.clone()),
            connection_id: Some(conn.id.clone()),
            ..Self::new(event)
        }
    }

    fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }
}

/// Notification hook that POSTs every event to a URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Creates a notifier posting to `url`.
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn post(&self, event: &WebhookEvent) -> HookResult {
        self.client
            .post(&self.url)
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl NotificationHook for WebhookNotifier {
    async fn on_server_connect(&self, conn: &ConnectionContext) -> HookResult {
        self.post(&WebhookEvent::connection(WebhookEventKind::ServerConnect, conn))
            .await
    }

    async fn on_server_banned(&self, address: &str, reason: &str) -> HookResult {
        let event = WebhookEvent {
            address: Some(address.to_string()),
            reason: Some(reason.to_string()),
            ..WebhookEvent::new(WebhookEventKind::ServerBanned)
        };
        self.post(&event).await
    }

    async fn on_server_connected(&self, conn: &ConnectionContext, username: &str) -> HookResult {
        let event =
            WebhookEvent::connection(WebhookEventKind::ServerConnected, conn).with_username(username);
        self.post(&event).await
    }

    async fn on_server_disconnected(&self, conn: &ConnectionContext, username: &str) -> HookResult {
        let event = WebhookEvent::connection(WebhookEventKind::ServerDisconnected, conn)
            .with_username(username);
        self.post(&event).await
    }
}
