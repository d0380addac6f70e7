//! WebSocket transport for native platforms.
//!
//! The blocking tungstenite socket lives on a background thread; the owning
//! session talks to it through channels and never blocks.

use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tungstenite::{Message, connect};
use url::Url;

use super::{SyncError, Transport, TransportEvent};

/// Commands sent to the WebSocket thread.
enum WsCommand {
    Send(String),
    Close,
}

/// WebSocket client for native platforms.
///
/// Uses a background thread for non-blocking operation.
pub struct NativeWebSocket {
    /// Channel to send commands to the WebSocket thread.
    cmd_tx: Option<Sender<WsCommand>>,
    /// Channel to receive events from the WebSocket thread.
    event_rx: Option<Receiver<TransportEvent>>,
    /// Handle to the WebSocket thread.
    _thread: Option<JoinHandle<()>>,
}

impl NativeWebSocket {
    /// Start connecting to a WebSocket server.
    ///
    /// Returns immediately; the outcome arrives as `Opened` or `Error` from
    /// [`Transport::poll_events`].
    pub fn connect(url: &Url) -> Result<Self, SyncError> {
        // Built without TLS support, so only plain `ws` can connect.
        if url.scheme() != "ws" {
            return Err(SyncError::Transport(format!(
                "Unsupported WebSocket URL scheme: {}",
                url.scheme()
            )));
        }

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<TransportEvent>();
        let url = url.to_string();

        let handle = thread::Builder::new()
            .name("sketchroom-ws".to_string())
            .spawn(move || run_socket(&url, &cmd_rx, &event_tx))
            .map_err(|e| SyncError::Transport(format!("Failed to spawn socket thread: {}", e)))?;

        Ok(Self {
            cmd_tx: Some(cmd_tx),
            event_rx: Some(event_rx),
            _thread: Some(handle),
        })
    }
}

fn run_socket(url: &str, cmd_rx: &Receiver<WsCommand>, event_tx: &Sender<TransportEvent>) {
    log::info!("WebSocket thread: connecting to {}", url);

    let (mut socket, response) = match connect(url) {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("WebSocket connection failed: {}", e);
            let _ = event_tx.send(TransportEvent::Error(format!("Connection failed: {}", e)));
            return;
        }
    };

    log::info!("WebSocket connected, status: {}", response.status());
    let _ = event_tx.send(TransportEvent::Opened);

    // Short read timeout so the loop can service outgoing commands.
    match socket.get_mut() {
        tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }
        #[allow(unreachable_patterns)]
        _ => {
            log::warn!("Unexpected stream type, reads may delay outgoing messages");
        }
    }

    loop {
        match cmd_rx.try_recv() {
            Ok(WsCommand::Send(msg)) => {
                log::debug!("WebSocket sending {} bytes", msg.len());
                if let Err(e) = socket.send(Message::Text(msg)) {
                    log::error!("WebSocket send error: {}", e);
                    let _ = event_tx.send(TransportEvent::Error(format!("Send failed: {}", e)));
                    break;
                }
            }
            Ok(WsCommand::Close) => {
                log::info!("WebSocket close requested");
                let _ = socket.close(None);
                let _ = socket.flush();
                return;
            }
            Err(TryRecvError::Disconnected) => {
                log::info!("WebSocket command channel disconnected");
                let _ = socket.close(None);
                return;
            }
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(txt)) => {
                log::debug!("WebSocket received {} bytes", txt.len());
                let _ = event_tx.send(TransportEvent::Message(txt));
            }
            Ok(Message::Close(_)) => {
                log::info!("WebSocket received close frame");
                break;
            }
            // Pings are answered by tungstenite; binary frames are not part of the protocol.
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(tungstenite::Error::ConnectionClosed) => break,
            Err(e) => {
                log::error!("WebSocket read error: {}", e);
                let _ = event_tx.send(TransportEvent::Error(format!("Read failed: {}", e)));
                break;
            }
        }
    }

    log::info!("WebSocket thread exiting");
    let _ = event_tx.send(TransportEvent::Closed);
}

impl Transport for NativeWebSocket {
    fn send_text(&mut self, text: String) -> Result<(), SyncError> {
        match self.cmd_tx {
            Some(ref tx) => tx
                .send(WsCommand::Send(text))
                .map_err(|e| SyncError::Transport(format!("Send failed: {}", e))),
            None => Err(SyncError::NotConnected),
        }
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        if let Some(ref rx) = self.event_rx {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        events
    }

    fn close(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(WsCommand::Close);
        }
        self.event_rx = None;
        self._thread = None;
    }
}

impl Drop for NativeWebSocket {
    fn drop(&mut self) {
        self.close();
    }
}
