//! Room synchronization.
//!
//! A [`SyncChannel`] owns one [`Transport`] connection for one room. The
//! transport is a mailbox: the session drains its events with
//! [`SyncChannel::poll`] and the channel turns them into connection-state
//! changes and decoded remote shapes. Sending fails fast unless the channel
//! is connected; nothing is queued.
//!
//! Closing is terminal. There is no automatic reconnect; rejoining the room
//! creates a new channel.

pub mod envelope;
mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod native;

pub use envelope::{decode_message, encode_shape};
pub use memory::{MemoryRelay, MemoryTransport};

#[cfg(not(target_arch = "wasm32"))]
pub use native::NativeWebSocket;

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::shapes::Shape;

/// Which part of a wire message failed to (de)serialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeLayer {
    Outer,
    Inner,
    Shape,
}

impl fmt::Display for EnvelopeLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnvelopeLayer::Outer => "outer envelope",
            EnvelopeLayer::Inner => "inner envelope",
            EnvelopeLayer::Shape => "shape payload",
        })
    }
}

/// Synchronization errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Malformed {layer}: {source}")]
    Malformed {
        layer: EnvelopeLayer,
        #[source]
        source: serde_json::Error,
    },
    #[error("Envelope for room {found} arrived on room {expected}")]
    RoomMismatch { expected: String, found: String },
    #[error("Not connected")]
    NotConnected,
    #[error("Room code must not be blank")]
    InvalidRoomCode,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Opaque room identifier used to scope fan-out on the relay.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    /// Accepts any code that is not empty or all whitespace. Surrounding whitespace is trimmed.
    pub fn new(code: impl AsRef<str>) -> Result<Self, SyncError> {
        let code = code.as_ref().trim();
        if code.is_empty() {
            return Err(SyncError::InvalidRoomCode);
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the code follows the four-digit convention used by the room picker.
    pub fn is_numeric_pin(&self) -> bool {
        self.0.len() == 4 && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// Raw events produced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection opened.
    Opened,
    /// A text message arrived.
    Message(String),
    /// The connection closed.
    Closed,
    /// The connection reported an error.
    Error(String),
}

/// Events the channel reports to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    StateChanged(ConnectionState),
    ShapeReceived(Shape),
}

/// A bidirectional text connection scoped to one room.
///
/// Implementations must not block: `send_text` enqueues and `poll_events`
/// drains whatever has arrived since the previous call.
pub trait Transport {
    /// Send one text message.
    fn send_text(&mut self, text: String) -> Result<(), SyncError>;

    /// Drain pending events.
    fn poll_events(&mut self) -> Vec<TransportEvent>;

    /// Close the connection. Idempotent.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_text(&mut self, text: String) -> Result<(), SyncError> {
        (**self).send_text(text)
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        (**self).poll_events()
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// The connection to one room.
pub struct SyncChannel<T: Transport> {
    room: RoomCode,
    transport: T,
    state: ConnectionState,
    closed: bool,
}

impl<T: Transport> SyncChannel<T> {
    /// Wrap a transport that is connecting to `room`.
    pub fn new(room: RoomCode, transport: T) -> Self {
        log::info!("Joining room {}", room);
        Self {
            room,
            transport,
            state: ConnectionState::Connecting,
            closed: false,
        }
    }

    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Check if the channel has been closed locally.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Encode and send a committed shape.
    ///
    /// Fails with [`SyncError::NotConnected`] unless the channel is connected;
    /// the shape is not queued for later.
    pub fn send(&mut self, shape: &Shape) -> Result<(), SyncError> {
        if self.closed || self.state != ConnectionState::Connected {
            return Err(SyncError::NotConnected);
        }
        let text = encode_shape(shape, &self.room)?;
        log::debug!(
            "Sending {} shape to room {} ({} bytes)",
            shape.kind.name(),
            self.room,
            text.len()
        );
        self.transport.send_text(text)
    }

    /// Drain transport events (non-blocking).
    ///
    /// Malformed or misrouted messages are logged and skipped; they never
    /// change the connection state.
    pub fn poll(&mut self) -> Vec<ChannelEvent> {
        let events = self.transport.poll_events();
        if self.closed {
            return Vec::new();
        }

        let mut out = Vec::new();
        for event in events {
            match event {
                TransportEvent::Opened => {
                    log::info!("Connected to room {}", self.room);
                    out.extend(self.set_state(ConnectionState::Connected));
                }
                TransportEvent::Closed => {
                    log::info!("Connection to room {} closed", self.room);
                    out.extend(self.set_state(ConnectionState::Disconnected));
                }
                TransportEvent::Error(message) => {
                    log::error!("Connection to room {} failed: {}", self.room, message);
                    out.extend(self.set_state(ConnectionState::Error));
                }
                TransportEvent::Message(text) => match decode_message(&text, &self.room) {
                    Ok(Some(shape)) => out.push(ChannelEvent::ShapeReceived(shape)),
                    Ok(None) => log::debug!("Ignoring non-drawing message in room {}", self.room),
                    Err(e) => log::warn!("Dropping message in room {}: {}", self.room, e),
                },
            }
        }
        out
    }

    fn set_state(&mut self, state: ConnectionState) -> Option<ChannelEvent> {
        if self.state == state {
            return None;
        }
        self.state = state;
        Some(ChannelEvent::StateChanged(state))
    }

    /// Close the connection. Terminal: later events are discarded and sends fail.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        log::info!("Leaving room {}", self.room);
        self.transport.close();
        self.closed = true;
        self.state = ConnectionState::Disconnected;
    }
}

impl<T: Transport> Drop for SyncChannel<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::ShapeKind;
    use kurbo::Point;

    fn room() -> RoomCode {
        RoomCode::new("4821").unwrap()
    }

    fn line() -> Shape {
        Shape::from_points(ShapeKind::Line, Point::new(0.0, 0.0), Point::new(5.0, 5.0))
    }

    fn connected(relay: &MemoryRelay) -> SyncChannel<MemoryTransport> {
        let mut channel = SyncChannel::new(room(), relay.connect(&room()));
        channel.poll();
        channel
    }

    #[test]
    fn test_room_code() {
        assert!(RoomCode::new("").is_err());
        assert!(RoomCode::new("   ").is_err());
        assert_eq!(RoomCode::new(" 4821 ").unwrap().as_str(), "4821");
        assert!(RoomCode::new("4821").unwrap().is_numeric_pin());
        assert!(!RoomCode::new("48a1").unwrap().is_numeric_pin());
        assert!(!RoomCode::new("48210").unwrap().is_numeric_pin());
    }

    #[test]
    fn test_state_transitions() {
        let relay = MemoryRelay::new();
        let mut channel = SyncChannel::new(room(), relay.connect(&room()));
        assert_eq!(channel.state(), ConnectionState::Connecting);

        let events = channel.poll();
        assert_eq!(events, vec![ChannelEvent::StateChanged(ConnectionState::Connected)]);
        assert!(channel.is_connected());

        relay.fail_room(&room(), "reset by peer");
        relay.close_room(&room());
        let events = channel.poll();
        assert_eq!(
            events,
            vec![
                ChannelEvent::StateChanged(ConnectionState::Error),
                ChannelEvent::StateChanged(ConnectionState::Disconnected),
            ]
        );
    }

    #[test]
    fn test_send_requires_connection() {
        let relay = MemoryRelay::new();
        let mut channel = SyncChannel::new(room(), relay.connect(&room()));
        assert!(matches!(channel.send(&line()), Err(SyncError::NotConnected)));
        assert!(channel.transport().sent().is_empty());

        channel.poll();
        channel.send(&line()).unwrap();
        assert_eq!(channel.transport().sent().len(), 1);
    }

    #[test]
    fn test_envelope_roundtrip_between_channels() {
        let relay = MemoryRelay::new();
        let mut a = connected(&relay);
        let mut b = connected(&relay);

        let shape = line();
        a.send(&shape).unwrap();

        assert_eq!(b.poll(), vec![ChannelEvent::ShapeReceived(shape)]);
        assert!(a.poll().is_empty());
    }

    #[test]
    fn test_malformed_message_keeps_state() {
        let relay = MemoryRelay::new();
        let mut channel = connected(&relay);

        relay.inject(&room(), r#"{"dataType":"drawing","data":"{\"DataTy"#);
        relay.inject(&room(), "not json at all");

        assert!(channel.poll().is_empty());
        assert_eq!(channel.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_close_is_terminal() {
        let relay = MemoryRelay::new();
        let mut channel = connected(&relay);
        channel.close();

        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert!(channel.is_closed());
        assert_eq!(relay.connection_count(&room()), 0);
        assert!(matches!(channel.send(&line()), Err(SyncError::NotConnected)));

        relay.inject(&room(), "{}");
        assert!(channel.poll().is_empty());
    }

    #[test]
    fn test_drop_closes_transport() {
        let relay = MemoryRelay::new();
        {
            let _channel = connected(&relay);
            assert_eq!(relay.connection_count(&room()), 1);
        }
        assert_eq!(relay.connection_count(&room()), 0);
    }
}
