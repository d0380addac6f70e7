//! In-memory relay.
//!
//! Fans text messages out verbatim to every other open connection in the
//! same room, like the WebSocket relay does, without sockets. Useful for
//! tests and for running several sessions in one process.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{RoomCode, SyncError, Transport, TransportEvent};

#[derive(Debug)]
struct Peer {
    room: RoomCode,
    open: bool,
    inbox: Vec<TransportEvent>,
}

#[derive(Debug, Default)]
struct RelayState {
    next_id: u64,
    peers: HashMap<u64, Peer>,
}

impl RelayState {
    fn room_peers(&mut self, room: &RoomCode) -> impl Iterator<Item = &mut Peer> {
        self.peers
            .values_mut()
            .filter(move |peer| peer.open && &peer.room == room)
    }
}

/// Shared in-memory relay. Cloning yields another handle to the same relay.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelay {
    state: Rc<RefCell<RelayState>>,
}

impl MemoryRelay {
    /// Create a new relay with no rooms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection to `room`. Its first polled event is `Opened`.
    pub fn connect(&self, room: &RoomCode) -> MemoryTransport {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.peers.insert(
            id,
            Peer {
                room: room.clone(),
                open: true,
                inbox: vec![TransportEvent::Opened],
            },
        );
        MemoryTransport {
            id,
            state: Rc::clone(&self.state),
            sent: Vec::new(),
        }
    }

    /// Number of open connections in `room`.
    pub fn connection_count(&self, room: &RoomCode) -> usize {
        self.state.borrow_mut().room_peers(room).count()
    }

    /// Deliver raw text to every open connection in `room`.
    pub fn inject(&self, room: &RoomCode, text: &str) {
        for peer in self.state.borrow_mut().room_peers(room) {
            peer.inbox.push(TransportEvent::Message(text.to_string()));
        }
    }

    /// Report a transport error to every open connection in `room`.
    pub fn fail_room(&self, room: &RoomCode, message: &str) {
        for peer in self.state.borrow_mut().room_peers(room) {
            peer.inbox.push(TransportEvent::Error(message.to_string()));
        }
    }

    /// Close every connection in `room` from the relay side.
    pub fn close_room(&self, room: &RoomCode) {
        for peer in self.state.borrow_mut().room_peers(room) {
            peer.inbox.push(TransportEvent::Closed);
            peer.open = false;
        }
    }
}

/// One connection to a [`MemoryRelay`].
#[derive(Debug)]
pub struct MemoryTransport {
    id: u64,
    state: Rc<RefCell<RelayState>>,
    sent: Vec<String>,
}

impl MemoryTransport {
    /// Every message this connection has sent, in order.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }
}

impl Transport for MemoryTransport {
    fn send_text(&mut self, text: String) -> Result<(), SyncError> {
        let mut state = self.state.borrow_mut();
        let room = match state.peers.get(&self.id) {
            Some(peer) if peer.open => peer.room.clone(),
            _ => return Err(SyncError::Transport("connection closed".to_string())),
        };

        let id = self.id;
        for (_, peer) in state
            .peers
            .iter_mut()
            .filter(|(peer_id, peer)| **peer_id != id && peer.open && peer.room == room)
        {
            peer.inbox.push(TransportEvent::Message(text.clone()));
        }
        self.sent.push(text);
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        self.state
            .borrow_mut()
            .peers
            .get_mut(&self.id)
            .map(|peer| std::mem::take(&mut peer.inbox))
            .unwrap_or_default()
    }

    fn close(&mut self) {
        if let Some(peer) = self.state.borrow_mut().peers.get_mut(&self.id) {
            peer.open = false;
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.state.borrow_mut().peers.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(code: &str) -> RoomCode {
        RoomCode::new(code).unwrap()
    }

    #[test]
    fn test_fan_out_skips_sender() {
        let relay = MemoryRelay::new();
        let mut a = relay.connect(&room("1"));
        let mut b = relay.connect(&room("1"));
        let mut c = relay.connect(&room("1"));
        a.poll_events();
        b.poll_events();
        c.poll_events();

        a.send_text("hello".to_string()).unwrap();

        assert!(a.poll_events().is_empty());
        assert_eq!(b.poll_events(), vec![TransportEvent::Message("hello".to_string())]);
        assert_eq!(c.poll_events(), vec![TransportEvent::Message("hello".to_string())]);
        assert_eq!(a.sent(), &["hello".to_string()]);
    }

    #[test]
    fn test_rooms_are_isolated() {
        let relay = MemoryRelay::new();
        let mut a = relay.connect(&room("1"));
        let mut b = relay.connect(&room("2"));
        b.poll_events();

        a.send_text("hello".to_string()).unwrap();
        assert!(b.poll_events().is_empty());
    }

    #[test]
    fn test_closed_transport() {
        let relay = MemoryRelay::new();
        let mut a = relay.connect(&room("1"));
        let mut b = relay.connect(&room("1"));
        b.poll_events();

        a.close();
        a.close();
        assert!(a.send_text("late".to_string()).is_err());
        assert_eq!(relay.connection_count(&room("1")), 1);

        b.send_text("hi".to_string()).unwrap();
        assert_eq!(a.poll_events(), vec![TransportEvent::Opened]);
    }

    #[test]
    fn test_close_room_notifies() {
        let relay = MemoryRelay::new();
        let mut a = relay.connect(&room("1"));
        a.poll_events();
        relay.close_room(&room("1"));
        assert_eq!(a.poll_events(), vec![TransportEvent::Closed]);
        assert!(a.send_text("x".to_string()).is_err());
    }
}
