//! Client connection management.

use crate::context::{ConnectionContext, ConnectionId};
use crate::error::{RealtimeError, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A frame queued for delivery to the socket's write loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// UTF-8 text frame.
    Text(String),
    /// Close the socket.
    Close,
}

/// A connected WebSocket client, node or viewer.
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier, same as the context id.
    pub id: ConnectionId,
    /// Source information captured at upgrade time.
    pub context: ConnectionContext,
    /// Channel for sending frames to this client.
    sender: mpsc::UnboundedSender<OutboundFrame>,
}

impl Client {
    /// Create a new client with a frame sender.
    pub fn new(context: ConnectionContext, sender: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self {
            id: context.id.clone(),
            context,
            sender,
        }
    }

    /// Send a text frame to this client.
    pub fn send(&self, text: impl Into<String>) -> Result<()> {
        self.sender
            .send(OutboundFrame::Text(text.into()))
            .map_err(|_| RealtimeError::ChannelClosed)
    }

    /// Ask the write loop to close the socket.
    pub fn close(&self) {
        let _ = self.sender.send(OutboundFrame::Close);
    }
}

/// Handle for receiving frames destined for the WebSocket.
pub type ClientReceiver = mpsc::UnboundedReceiver<OutboundFrame>;

/// Create a new client with its frame receiver.
pub fn create_client(context: ConnectionContext) -> (Arc<Client>, ClientReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let client = Arc::new(Client::new(context, sender));
    (client, receiver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let (client, _rx) = create_client(ConnectionContext::new("192.0.2.10"));
        assert_eq!(client.id, client.context.id);
        assert_eq!(client.context.address, "192.0.2.10");
    }

    #[test]
    fn test_client_send_and_close() {
        let (client, mut rx) = create_client(ConnectionContext::new("192.0.2.10"));

        client.send("hello").unwrap();
        client.close();

        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Text("hello".into()));
        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Close);
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (client, rx) = create_client(ConnectionContext::new("192.0.2.10"));
        drop(rx);

        assert!(matches!(client.send("x"), Err(RealtimeError::ChannelClosed)));
    }
}
