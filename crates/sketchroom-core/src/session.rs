//! Drawing session: one room's shapes, view, tools and connection.

use kurbo::Point;

use crate::camera::Camera;
use crate::config::SessionConfig;
use crate::document::ShapeModel;
use crate::shapes::Shape;
use crate::sync::{ChannelEvent, ConnectionState, RoomCode, SyncChannel, SyncError, Transport};
use crate::tools::{PointerEvent, ToolKind, ToolManager};

/// Coalesces redraw requests into at most one paint per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedrawFlag {
    dirty: bool,
}

impl Default for RedrawFlag {
    /// Starts dirty so the first frame paints.
    fn default() -> Self {
        Self { dirty: true }
    }
}

impl RedrawFlag {
    pub fn mark(&mut self) {
        self.dirty = true;
    }

    pub fn is_set(&self) -> bool {
        self.dirty
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

/// Client state for a joined room.
///
/// Owns the room connection: it is closed when the room changes, when the
/// session is left or unloaded, and when the session is dropped.
pub struct Session<T: Transport> {
    config: SessionConfig,
    model: ShapeModel,
    camera: Camera,
    tools: ToolManager,
    channel: Option<SyncChannel<T>>,
    redraw: RedrawFlag,
}

impl<T: Transport> Session<T> {
    /// Join `room` over an already-connecting transport.
    ///
    /// An invalid view config falls back to the default view.
    pub fn join(config: SessionConfig, room: RoomCode, transport: T) -> Self {
        let camera = Camera::with_config(&config.view);
        Self {
            config,
            model: ShapeModel::new(),
            camera,
            tools: ToolManager::new(),
            channel: Some(SyncChannel::new(room, transport)),
            redraw: RedrawFlag::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn model(&self) -> &ShapeModel {
        &self.model
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn channel(&self) -> Option<&SyncChannel<T>> {
        self.channel.as_ref()
    }

    /// The joined room, or `None` after leaving.
    pub fn room(&self) -> Option<&RoomCode> {
        self.channel.as_ref().map(SyncChannel::room)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel
            .as_ref()
            .map_or(ConnectionState::Disconnected, SyncChannel::state)
    }

    // --- Input ---

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tools.set_tool(tool);
    }

    /// Set the text the text tool will place.
    pub fn set_staged_text(&mut self, text: impl Into<String>) {
        self.tools.set_staged_text(text);
    }

    /// Handle a device-space pointer event.
    ///
    /// Local changes land in the model immediately. A finalized shape is sent
    /// to the room and returned; when the channel is not connected the send is
    /// dropped but the shape stays committed locally.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> Option<Shape> {
        let outcome = self
            .tools
            .handle_pointer(event, &mut self.model, &mut self.camera);
        if outcome.changed {
            self.redraw.mark();
        }
        let shape = outcome.finalized?;
        self.emit(&shape);
        Some(shape)
    }

    fn emit(&mut self, shape: &Shape) {
        let Some(channel) = self.channel.as_mut() else {
            log::debug!("No room joined, keeping {} shape local", shape.kind.name());
            return;
        };
        match channel.send(shape) {
            Ok(()) => {}
            Err(SyncError::NotConnected) => {
                log::debug!(
                    "Room {} not connected ({:?}), dropping {} shape",
                    channel.room(),
                    channel.state(),
                    shape.kind.name()
                );
            }
            Err(e) => log::warn!("Failed to send shape to room {}: {}", channel.room(), e),
        }
    }

    // --- View ---

    pub fn zoom_in(&mut self) {
        if self.camera.zoom_in() {
            self.redraw.mark();
        }
    }

    pub fn zoom_out(&mut self) {
        if self.camera.zoom_out() {
            self.redraw.mark();
        }
    }

    pub fn reset_view(&mut self) {
        self.camera.reset();
        self.redraw.mark();
    }

    /// Convert a device point using the current view.
    pub fn to_logical(&self, device: Point) -> Point {
        self.camera.to_logical(device)
    }

    // --- Network ---

    /// Drain the channel's mailbox, appending remote shapes.
    ///
    /// Returns the connection-state changes observed, in order.
    pub fn process_network(&mut self) -> Vec<ConnectionState> {
        let Some(channel) = self.channel.as_mut() else {
            return Vec::new();
        };

        let mut states = Vec::new();
        for event in channel.poll() {
            match event {
                ChannelEvent::ShapeReceived(shape) => {
                    log::debug!("Received {} shape", shape.kind.name());
                    self.model.append_remote(shape);
                    self.redraw.mark();
                }
                ChannelEvent::StateChanged(state) => states.push(state),
            }
        }
        states
    }

    /// Leave the current room and join another. Shapes do not carry over.
    pub fn change_room(&mut self, room: RoomCode, transport: T) {
        self.leave();
        self.channel = Some(SyncChannel::new(room, transport));
    }

    /// Close the connection and discard the drawing.
    pub fn leave(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.model.clear();
        self.tools.reset();
        self.redraw.mark();
    }

    /// The host environment is about to unload; release the connection now.
    pub fn handle_unload(&mut self) {
        log::info!("Unloading session");
        self.leave();
    }

    // --- Redraw ---

    pub fn needs_redraw(&self) -> bool {
        self.redraw.is_set()
    }

    /// Clear the redraw flag, returning whether a redraw was pending.
    pub fn take_redraw(&mut self) -> bool {
        self.redraw.take()
    }

    /// Request a redraw without a model change, e.g. after a resize.
    pub fn request_redraw(&mut self) {
        self.redraw.mark();
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Session<crate::sync::NativeWebSocket> {
    /// Connect to the configured relay and join `room`.
    pub fn connect(config: SessionConfig, room: RoomCode) -> Result<Self, SyncError> {
        config.view.validate()?;
        let url = config.room_url(&room)?;
        let transport = crate::sync::NativeWebSocket::connect(&url)?;
        Ok(Self::join(config, room, transport))
    }
}
