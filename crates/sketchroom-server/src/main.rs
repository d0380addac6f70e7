//! SketchRoom WebSocket Relay Server
//!
//! Relays drawing messages between clients in the same room.
//!
//! ## Protocol
//!
//! Clients connect to `/ws/{code}`; the path segment names the room. Every
//! text frame a client sends is rebroadcast unchanged to every other client
//! in that room:
//! ```json
//! { "dataType": "drawing", "data": "<inner envelope JSON>" }
//! ```
//! Frames whose `dataType` is `"test"` are connectivity probes and are not
//! relayed. A room keeps its most recent messages in memory and replays them
//! to clients that join later; the room is dropped when its last client leaves.

use axum::{
    Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::{
    collections::{HashSet, VecDeque},
    net::SocketAddr,
    sync::Arc,
};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Environment variable holding the listen address.
const ADDR_ENV: &str = "SKETCHROOM_ADDR";
const DEFAULT_PORT: u16 = 8080;
const MAX_ROOM_HISTORY: usize = 100;
const CHANNEL_CAPACITY: usize = 256;
/// `dataType` of probe messages that are acknowledged but never relayed.
const PROBE_DATA_TYPE: &str = "test";

/// Server configuration
#[derive(Debug, Clone)]
struct ServerConfig {
    addr: SocketAddr,
    /// Messages kept per room for late joiners.
    max_room_history: usize,
    /// Capacity of each room's broadcast channel.
    channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_room_history: MAX_ROOM_HISTORY,
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(addr) = parse_addr(std::env::var(ADDR_ENV).ok().as_deref()) {
            config.addr = addr;
        }
        config
    }
}

fn parse_addr(value: Option<&str>) -> Option<SocketAddr> {
    let value = value?.trim();
    match value.parse() {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!("Ignoring invalid {}={:?}: {}", ADDR_ENV, value, e);
            None
        }
    }
}

/// Only the tag is inspected; the rest of the message is relayed untouched.
#[derive(Deserialize)]
struct MessageTag {
    #[serde(rename = "dataType", default)]
    data_type: String,
}

fn is_probe(text: &str) -> bool {
    serde_json::from_str::<MessageTag>(text).is_ok_and(|tag| tag.data_type == PROBE_DATA_TYPE)
}

/// Room state
struct Room {
    /// Broadcast channel for this room, carrying `(sender peer id, text)`.
    tx: broadcast::Sender<(String, String)>,
    /// Connected peer IDs
    peers: HashSet<String>,
    /// Most recent messages, oldest first.
    history: VecDeque<String>,
}

impl Room {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            peers: HashSet::new(),
            history: VecDeque::new(),
        }
    }
}

/// Shared application state
struct AppState {
    config: ServerConfig,
    /// Active rooms
    rooms: DashMap<String, Room>,
}

impl AppState {
    fn new(config: ServerConfig) -> Self {
        Self {
            config,
            rooms: DashMap::new(),
        }
    }

    /// Add peer to room, returning its receiver and the history to replay.
    ///
    /// Subscribing and snapshotting happen under the room's lock, so the
    /// peer sees every message exactly once.
    fn join_room(
        &self,
        code: &str,
        peer_id: &str,
    ) -> (broadcast::Receiver<(String, String)>, Vec<String>) {
        let mut room = self
            .rooms
            .entry(code.to_string())
            .or_insert_with(|| Room::new(self.config.channel_capacity));
        room.peers.insert(peer_id.to_string());
        let rx = room.tx.subscribe();
        let history = room.history.iter().cloned().collect();
        (rx, history)
    }

    /// Remove peer from room
    fn leave_room(&self, code: &str, peer_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(code) {
            room.peers.remove(peer_id);
            // Clean up empty rooms
            if room.peers.is_empty() {
                drop(room);
                self.rooms.remove_if(code, |_, room| room.peers.is_empty());
            }
        }
    }

    /// Record and broadcast a message. Returns the number of receivers, sender included.
    fn relay(&self, code: &str, from: &str, text: String) -> usize {
        let Some(mut room) = self.rooms.get_mut(code) else {
            return 0;
        };
        let limit = self.config.max_room_history;
        if limit > 0 {
            while room.history.len() >= limit {
                room.history.pop_front();
            }
            room.history.push_back(text.clone());
        }
        room.tx.send((from.to_string(), text)).unwrap_or(0)
    }

    fn peer_count(&self, code: &str) -> usize {
        self.rooms.get(code).map_or(0, |room| room.peers.len())
    }

    #[cfg(test)]
    fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws/{code}", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketchroom_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    let addr = config.addr;
    let state = Arc::new(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("SketchRoom relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws/{{code}}", addr);

    axum::serve(listener, app(state)).await
}

/// Index page
async fn index() -> &'static str {
    "SketchRoom Relay Server - Connect via WebSocket at /ws/{code}"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, code))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, code: String) {
    let peer_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();
    let (mut rx, history) = state.join_room(&code, &peer_id);
    info!(
        "Peer {} joined room {} ({} connected, replaying {} messages)",
        peer_id,
        code,
        state.peer_count(&code),
        history.len()
    );

    let mut open = true;
    for text in history {
        if sender.send(Message::Text(text.into())).await.is_err() {
            open = false;
            break;
        }
    }

    while open {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let text = text.as_str().to_owned();
                        if is_probe(&text) {
                            debug!("Probe from {} in room {}", peer_id, code);
                        } else {
                            let receivers = state.relay(&code, &peer_id, text);
                            debug!(
                                "Relayed message from {} to {} peers in room {}",
                                peer_id,
                                receivers.saturating_sub(1),
                                code
                            );
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!("Ignoring {} byte binary frame from {}", data.len(), peer_id);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        open = false;
                    }
                    Some(Ok(_)) => {} // Ignore ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        open = false;
                    }
                }
            }

            // Handle broadcast messages from room
            msg = rx.recv() => {
                match msg {
                    // Don't echo back to sender
                    Ok((from, text)) if from != peer_id => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            open = false;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            "Peer {} fell behind in room {}, skipped {} messages",
                            peer_id, code, skipped
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        open = false;
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    state.leave_room(&code, &peer_id);
    info!("Peer {} left room {}", peer_id, code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::{sleep, timeout};
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn spawn_server(config: ServerConfig) -> (SocketAddr, Arc<AppState>) {
        let state = Arc::new(AppState::new(config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = app(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (addr, state)
    }

    async fn join(addr: SocketAddr, state: &AppState, code: &str) -> Client {
        let before = state.peer_count(code);
        let (ws, _) = connect_async(format!("ws://{}/ws/{}", addr, code)).await.unwrap();
        wait_until(|| state.peer_count(code) > before).await;
        ws
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    async fn send(ws: &mut Client, text: &str) {
        ws.send(tungstenite::Message::Text(text.to_string().into())).await.unwrap();
    }

    async fn recv(ws: &mut Client) -> String {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .expect("websocket error");
        msg.to_text().unwrap().to_owned()
    }

    async fn assert_silent(ws: &mut Client) {
        assert!(timeout(Duration::from_millis(200), ws.next()).await.is_err());
    }

    const DRAWING: &str = r#"{"dataType":"drawing","data":"{\"DataType\":\"drawing\",\"Data\":\"{\\\"type\\\":\\\"line\\\",\\\"startX\\\":0,\\\"startY\\\":0,\\\"endX\\\":5,\\\"endY\\\":5}\",\"Code\":\"4821\"}"}"#;

    #[test]
    fn test_parse_addr() {
        assert_eq!(parse_addr(None), None);
        assert_eq!(
            parse_addr(Some("127.0.0.1:9000")),
            Some(SocketAddr::from(([127, 0, 0, 1], 9000)))
        );
        assert_eq!(parse_addr(Some("localhost")), None);

        let config = ServerConfig::default();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.max_room_history, 100);
        assert_eq!(config.channel_capacity, 256);
    }

    #[test]
    fn test_is_probe() {
        assert!(is_probe(r#"{"dataType":"test","data":"Connection established"}"#));
        assert!(!is_probe(DRAWING));
        assert!(!is_probe("not json"));
    }

    #[tokio::test]
    async fn test_relay_verbatim_without_echo() {
        let (addr, state) = spawn_server(ServerConfig::default()).await;
        let mut a = join(addr, &state, "4821").await;
        let mut b = join(addr, &state, "4821").await;
        let mut c = join(addr, &state, "4821").await;

        send(&mut a, DRAWING).await;

        assert_eq!(recv(&mut b).await, DRAWING);
        assert_eq!(recv(&mut c).await, DRAWING);
        assert_silent(&mut a).await;
    }

    #[tokio::test]
    async fn test_rooms_isolated() {
        let (addr, state) = spawn_server(ServerConfig::default()).await;
        let mut a = join(addr, &state, "1111").await;
        let mut b = join(addr, &state, "2222").await;

        send(&mut a, DRAWING).await;
        assert_silent(&mut b).await;
    }

    #[tokio::test]
    async fn test_late_joiner_gets_history() {
        let config = ServerConfig {
            max_room_history: 2,
            ..ServerConfig::default()
        };
        let (addr, state) = spawn_server(config).await;
        let mut a = join(addr, &state, "4821").await;
        let mut b = join(addr, &state, "4821").await;

        for text in ["one", "two", "three"] {
            send(&mut a, text).await;
            assert_eq!(recv(&mut b).await, text);
        }

        let mut late = join(addr, &state, "4821").await;
        assert_eq!(recv(&mut late).await, "two");
        assert_eq!(recv(&mut late).await, "three");
        assert_silent(&mut late).await;
    }

    #[tokio::test]
    async fn test_probe_not_relayed() {
        let (addr, state) = spawn_server(ServerConfig::default()).await;
        let mut a = join(addr, &state, "4821").await;
        let mut b = join(addr, &state, "4821").await;

        send(&mut a, r#"{"dataType":"test","data":"ping"}"#).await;
        send(&mut a, DRAWING).await;
        assert_eq!(recv(&mut b).await, DRAWING);
    }

    #[tokio::test]
    async fn test_empty_room_dropped() {
        let (addr, state) = spawn_server(ServerConfig::default()).await;
        let mut a = join(addr, &state, "4821").await;
        let mut b = join(addr, &state, "4821").await;
        send(&mut a, DRAWING).await;
        recv(&mut b).await;

        a.close(None).await.unwrap();
        b.close(None).await.unwrap();
        wait_until(|| state.room_count() == 0).await;

        // A fresh room starts without history.
        let mut c = join(addr, &state, "4821").await;
        assert_silent(&mut c).await;
    }

    #[tokio::test]
    async fn test_health() {
        let (addr, _state) = spawn_server(ServerConfig::default()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("ok"));
    }
}
