//! SketchRoom Core Library
//!
//! Client-side drawing-session engine for a shared whiteboard room: the shape
//! model, the pointer interaction state machine, the pan/zoom transform and
//! the room synchronization channel.

pub mod camera;
pub mod config;
pub mod document;
pub mod session;
pub mod shapes;
pub mod sync;
pub mod tools;

pub use camera::Camera;
pub use config::{ConfigError, SessionConfig, ViewConfig};
pub use document::ShapeModel;
pub use session::{RedrawFlag, Session};
pub use shapes::{Shape, ShapeKind, TextExtra};
pub use sync::{
    ChannelEvent, ConnectionState, MemoryRelay, MemoryTransport, RoomCode, SyncChannel, SyncError,
    Transport, TransportEvent,
};
pub use tools::{PointerEvent, ToolKind, ToolManager, ToolOutcome, ToolState};

#[cfg(not(target_arch = "wasm32"))]
pub use sync::NativeWebSocket;
