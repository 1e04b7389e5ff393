//! End-to-end tests for the WebSocket gateway.

use futures::{SinkExt, StreamExt};
use nodestatus_node::{gateway, registry::hash_password, AppState, FileRegistry};
use nodestatus_realtime::{notice, NodeStatus, PushConfig};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, Message},
    MaybeTlsStream, WebSocketStream,
};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(10);

struct TestHub {
    addr: SocketAddr,
    service: Arc<NodeStatus>,
    _dir: TempDir,
}

impl TestHub {
    async fn start(push: PushConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.yaml");
        let hash = hash_password("s3cret").unwrap();
        std::fs::write(
            &path,
            format!(
                r#"
servers:
  - username: alice
    password: "{hash}"
    id: 1
    name: alpha
    type: kvm
    location: Tokyo
    region: jp
  - username: bob
    password: "{hash}"
    id: 2
    name: beta
"#
            ),
        )
        .unwrap();

        let service = Arc::new(
            NodeStatus::builder(Arc::new(FileRegistry::new(&path)))
                .push(push)
                .build(),
        );
        service.init().await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState {
            service: Arc::clone(&service),
        };
        tokio::spawn(async move {
            gateway::serve(listener, state, std::future::pending())
                .await
                .unwrap()
        });

        Self {
            addr,
            service,
            _dir: dir,
        }
    }

    async fn open(&self, path: &str, forwarded_for: &str) -> Ws {
        let mut request = format!("ws://{}{}", self.addr, path)
            .into_client_request()
            .unwrap();
        request
            .headers_mut()
            .insert("x-forwarded-for", forwarded_for.parse().unwrap());
        let (ws, _) = connect_async(request).await.unwrap();
        ws
    }

    async fn node(&self, forwarded_for: &str) -> Ws {
        let mut ws = self.open("/connect", forwarded_for).await;
        assert_eq!(next_text(&mut ws).await, notice::AUTH_REQUIRED);
        ws
    }
}

fn default_push() -> PushConfig {
    PushConfig::default()
}

async fn next_text(ws: &mut Ws) -> String {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        match msg {
            Message::Text(text) => return text.as_str().to_owned(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn next_json(ws: &mut Ws) -> Value {
    serde_json::from_str(&next_text(ws).await).unwrap()
}

async fn send_msgpack(ws: &mut Ws, value: Value) {
    let payload = rmp_serde::to_vec_named(&value).unwrap();
    ws.send(Message::Binary(payload.into())).await.unwrap();
}

async fn login(ws: &mut Ws, username: &str, password: &str) {
    send_msgpack(ws, json!({"username": username, "password": password})).await;
}

async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_node_status_reaches_viewers() {
    let hub = TestHub::start(PushConfig {
        enabled: true,
        interval: Duration::from_millis(200),
    })
    .await;

    let mut node = hub.node("203.0.113.5").await;
    login(&mut node, "alice", "s3cret").await;
    assert_eq!(next_text(&mut node).await, notice::GRANTED);
    assert_eq!(next_text(&mut node).await, "You are connecting via: IPv4");

    send_msgpack(&mut node, json!({"online4": true, "cpu": 12, "uptime": 3600})).await;
    eventually(|| hub.service.state().public_snapshot().online_count() == 1).await;

    let mut viewer = hub.open("/public", "198.51.100.20").await;
    let frame = next_json(&mut viewer).await;
    let servers = frame["servers"].as_array().unwrap();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0]["name"], "beta");
    assert_eq!(servers[0]["status"], json!({}));
    assert_eq!(servers[1]["name"], "alpha");
    assert_eq!(servers[1]["type"], "kvm");
    assert_eq!(servers[1]["status"]["cpu"], 12);
    assert!(frame["updated"].as_u64().is_some());

    node.close(None).await.unwrap();
    eventually(|| {
        hub.service
            .state()
            .status("alice")
            .is_some_and(|status| status.is_empty())
    })
    .await;

    // A later scheduled push reflects the disconnect.
    loop {
        let frame = next_json(&mut viewer).await;
        if frame["servers"][1]["status"] == json!({}) {
            break;
        }
    }
}

#[tokio::test]
async fn test_blank_password_is_banned_but_kept_open() {
    let hub = TestHub::start(default_push()).await;

    let mut node = hub.node("203.0.113.9").await;
    login(&mut node, "alice", "").await;
    assert_eq!(next_text(&mut node).await, notice::BLANK);
    assert!(hub.service.bans().is_banned("203.0.113.9"));

    // Inert: further messages get no answer and change nothing.
    send_msgpack(&mut node, json!({"online4": true})).await;
    assert!(timeout(Duration::from_millis(300), node.next()).await.is_err());
    assert!(hub.service.state().status("alice").unwrap().is_empty());

    // A new socket from the same address is told it is banned.
    let mut retry = hub.node("203.0.113.9").await;
    login(&mut retry, "alice", "s3cret").await;
    assert_eq!(next_text(&mut retry).await, notice::BANNED);
}

#[tokio::test]
async fn test_malformed_credentials_close_the_socket() {
    let hub = TestHub::start(default_push()).await;

    let mut node = hub.node("203.0.113.10").await;
    node.send(Message::Binary(vec![0xc1, 0x00].into()))
        .await
        .unwrap();
    assert_eq!(next_text(&mut node).await, notice::CHECK_DETAILS);

    let closed = timeout(WAIT, node.next()).await.unwrap();
    assert!(matches!(closed, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
    assert_eq!(
        hub.service.bans().reason("203.0.113.10").as_deref(),
        Some("malformed credentials")
    );
}

#[tokio::test]
async fn test_second_session_is_rejected() {
    let hub = TestHub::start(default_push()).await;

    let mut first = hub.node("203.0.113.30").await;
    login(&mut first, "bob", "s3cret").await;
    assert_eq!(next_text(&mut first).await, notice::GRANTED);
    next_text(&mut first).await;

    let mut second = hub.node("203.0.113.31").await;
    login(&mut second, "bob", "s3cret").await;
    assert_eq!(next_text(&mut second).await, notice::DUPLICATE);
    assert!(!hub.service.bans().is_banned("203.0.113.30"));

    // The first session still streams.
    send_msgpack(&mut first, json!({"online6": true})).await;
    eventually(|| hub.service.state().public_snapshot().online_count() == 1).await;
}

#[tokio::test]
async fn test_wrong_password() {
    let hub = TestHub::start(default_push()).await;

    let mut node = hub.node("203.0.113.40").await;
    login(&mut node, "alice", "hunter2").await;
    assert_eq!(next_text(&mut node).await, notice::WRONG_CREDENTIALS);
    assert_eq!(
        hub.service.bans().reason("203.0.113.40").as_deref(),
        Some("bad credentials")
    );
}

#[tokio::test]
async fn test_ipv6_forwarded_address() {
    let hub = TestHub::start(default_push()).await;

    let mut node = hub.node("2001:db8::1").await;
    login(&mut node, "alice", "s3cret").await;
    assert_eq!(next_text(&mut node).await, notice::GRANTED);
    assert_eq!(next_text(&mut node).await, "You are connecting via: IPv6");
}

#[tokio::test]
async fn test_viewers_have_independent_timers() {
    let hub = TestHub::start(PushConfig {
        enabled: true,
        interval: Duration::from_millis(300),
    })
    .await;

    let mut first = hub.open("/public", "198.51.100.1").await;
    next_json(&mut first).await;
    let mut second = hub.open("/public", "198.51.100.2").await;
    next_json(&mut second).await;

    drop(first);
    for _ in 0..3 {
        let frame = next_json(&mut second).await;
        assert_eq!(frame["servers"].as_array().unwrap().len(), 2);
    }
}

#[tokio::test]
async fn test_disabled_push_sends_only_initial_snapshot() {
    let hub = TestHub::start(PushConfig {
        enabled: false,
        interval: Duration::from_millis(100),
    })
    .await;

    let mut viewer = hub.open("/public", "198.51.100.3").await;
    next_json(&mut viewer).await;
    assert!(timeout(Duration::from_millis(400), viewer.next()).await.is_err());
}

#[tokio::test]
async fn test_stray_upgrade_is_refused() {
    let hub = TestHub::start(default_push()).await;

    let request = format!("ws://{}/elsewhere", hub.addr)
        .into_client_request()
        .unwrap();
    assert!(connect_async(request).await.is_err());
}

#[tokio::test]
async fn test_health() {
    let hub = TestHub::start(default_push()).await;

    let response = reqwest::get(format!("http://{}/health", hub.addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["servers"], 2);
    assert_eq!(body["online"], 0);
}
