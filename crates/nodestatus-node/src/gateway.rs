//! WebSocket gateway.
//!
//! - `/connect` - node channel: one-shot authentication, then status stream
//! - `/public` - viewer channel: periodic JSON snapshots, no inbound protocol
//! - `/health` - liveness document
//!
//! Upgrade requests for any other path are refused without a handshake and
//! the connection is closed after the response.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Request, State,
    },
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use futures_util::{
    future,
    stream::{SplitSink, SplitStream},
    SinkExt, Stream, StreamExt,
};
use nodestatus_realtime::{
    create_client, resolve_source_address, ClientReceiver, ConnectionContext, ConnectionId,
    NodeStatus, OutboundFrame,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Node channel path.
pub const CONNECT_PATH: &str = "/connect";
/// Viewer channel path.
pub const PUBLIC_PATH: &str = "/public";

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The status service.
    pub service: Arc<NodeStatus>,
}

/// Creates the gateway router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(CONNECT_PATH, get(connect_handler))
        .route(PUBLIC_PATH, get(public_handler))
        .layer(middleware::from_fn(reject_stray_upgrades))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the gateway on `listener` until `shutdown` resolves.
///
/// Peer addresses are captured per connection, so the router must be served
/// through this function (or with `into_make_service_with_connect_info`).
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.service.state().public_snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "servers": snapshot.len(),
        "online": snapshot.online_count(),
    }))
}

async fn reject_stray_upgrades(request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if request.headers().contains_key(header::UPGRADE)
        && path != CONNECT_PATH
        && path != PUBLIC_PATH
    {
        debug!(path = %path, "Refusing upgrade on unknown path");
        return (StatusCode::NOT_FOUND, [(header::CONNECTION, "close")]).into_response();
    }
    next.run(request).await
}

fn connection_context(headers: &HeaderMap, peer: SocketAddr) -> ConnectionContext {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok());
    ConnectionContext::new(resolve_source_address(forwarded, peer.ip()))
}

/// Node channel upgrade handler.
async fn connect_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let context = connection_context(&headers, peer);
    ws.on_upgrade(move |socket| handle_node(socket, context, state.service))
}

/// Viewer channel upgrade handler.
async fn public_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let context = connection_context(&headers, peer);
    ws.on_upgrade(move |socket| handle_viewer(socket, context, state.service))
}

async fn handle_node(socket: WebSocket, context: ConnectionContext, service: Arc<NodeStatus>) {
    let (client, receiver) = create_client(context);
    let client_id = client.id.clone();
    let (ws_sender, ws_receiver) = socket.split();

    let send_task = tokio::spawn(forward_frames(ws_sender, receiver, client_id.clone()));

    service
        .serve_node(Arc::clone(&client), inbound_payloads(ws_receiver, client_id.clone()))
        .await;

    // Let the write loop flush pending notices, then end with the last sender.
    drop(client);
    let _ = send_task.await;
    debug!(client_id = %client_id, "Node socket closed");
}

async fn handle_viewer(socket: WebSocket, context: ConnectionContext, service: Arc<NodeStatus>) {
    let address = context.address.clone();
    let (client, receiver) = create_client(context);
    let client_id = client.id.clone();
    let (ws_sender, mut ws_receiver) = socket.split();

    info!(client_id = %client_id, address = %address, "Viewer connected");
    let send_task = tokio::spawn(forward_frames(ws_sender, receiver, client_id.clone()));
    let push = service.register_viewer(client);

    // Viewers have no inbound protocol; read until the socket closes.
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => debug!(client_id = %client_id, "Ignoring viewer message"),
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "Viewer socket error");
                break;
            }
        }
    }

    drop(push);
    send_task.abort();
    info!(client_id = %client_id, address = %address, "Viewer disconnected");
}

/// Writes queued frames to the socket until the queue ends or a close is
/// requested.
async fn forward_frames(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut receiver: ClientReceiver,
    client_id: ConnectionId,
) {
    while let Some(frame) = receiver.recv().await {
        match frame {
            OutboundFrame::Text(text) => {
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            OutboundFrame::Close => {
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    }
    debug!(client_id = %client_id, "Send task ended");
}

/// Payloads of inbound data frames, ending at the first close frame or
/// socket error.
fn inbound_payloads(
    ws_receiver: SplitStream<WebSocket>,
    client_id: ConnectionId,
) -> impl Stream<Item = Bytes> + Unpin {
    ws_receiver
        .take_while(move |msg| {
            let open = match msg {
                Ok(Message::Close(_)) => false,
                Err(e) => {
                    debug!(client_id = %client_id, error = %e, "Node socket error");
                    false
                }
                Ok(_) => true,
            };
            future::ready(open)
        })
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Binary(data)) => Some(data),
                Ok(Message::Text(text)) => Some(Bytes::copy_from_slice(text.as_str().as_bytes())),
                _ => None,
            })
        })
}
