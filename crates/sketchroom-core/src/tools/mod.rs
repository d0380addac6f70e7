//! Tool system for the whiteboard.
//!
//! [`ToolManager`] turns device-space pointer events into shape model and
//! camera mutations. Gestures run `Idle -> Dragging -> Idle` for geometric
//! tools, `Idle -> Panning -> Idle` for the pan tool, and text placement
//! commits on the pointer-down itself.

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::document::ShapeModel;
use crate::shapes::{Shape, ShapeKind, TextExtra};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Line,
    Circle,
    Rectangle,
    Text,
    Pan,
}

impl ToolKind {
    /// The shape this tool draws. Pan draws nothing.
    pub fn shape_kind(self) -> Option<ShapeKind> {
        match self {
            ToolKind::Line => Some(ShapeKind::Line),
            ToolKind::Circle => Some(ShapeKind::Circle),
            ToolKind::Rectangle => Some(ShapeKind::Rectangle),
            ToolKind::Text => Some(ShapeKind::Text),
            ToolKind::Pan => None,
        }
    }
}

/// Pointer input in device coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down(Point),
    Move(Point),
    Up(Point),
    /// The pointer left the drawing surface. Ends a gesture like `Up`.
    Leave(Point),
}

/// State of a tool interaction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ToolState {
    /// Tool is idle, waiting for interaction.
    #[default]
    Idle,
    /// A shape is being dragged out; it lives in the model's in-progress slot.
    Dragging,
    /// The view is being dragged.
    Panning {
        /// Device point of the previous pointer event.
        anchor: Point,
    },
}

/// What handling one pointer event did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutcome {
    /// The model or camera changed and the canvas needs a redraw.
    pub changed: bool,
    /// A shape was committed and must be sent to peers.
    pub finalized: Option<Shape>,
}

impl ToolOutcome {
    fn unchanged() -> Self {
        Self::default()
    }

    fn changed() -> Self {
        Self {
            changed: true,
            finalized: None,
        }
    }
}

/// Manages the current tool and its state.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    /// Currently selected tool.
    pub current_tool: ToolKind,
    /// Current state of the tool.
    pub state: ToolState,
    /// Content of the text input, placed by the text tool.
    staged_text: String,
}

impl ToolManager {
    /// Create a new tool manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current tool. A gesture already running finishes with the tool it started with.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.current_tool = tool;
    }

    /// Set the text the text tool will place on the next click.
    pub fn set_staged_text(&mut self, text: impl Into<String>) {
        self.staged_text = text.into();
    }

    pub fn staged_text(&self) -> &str {
        &self.staged_text
    }

    /// Check if a gesture is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, ToolState::Idle)
    }

    /// Return to idle without touching the model. Used when the session is reset.
    pub fn reset(&mut self) {
        self.state = ToolState::Idle;
    }

    /// Feed one pointer event through the state machine.
    pub fn handle_pointer(
        &mut self,
        event: PointerEvent,
        model: &mut ShapeModel,
        camera: &mut Camera,
    ) -> ToolOutcome {
        match (self.state, event) {
            (ToolState::Idle, PointerEvent::Down(device)) => self.begin(device, model, camera),
            (ToolState::Dragging, PointerEvent::Move(device)) => {
                if model.update_in_progress(camera.to_logical(device)) {
                    ToolOutcome::changed()
                } else {
                    // The in-progress shape was dropped underneath us.
                    self.state = ToolState::Idle;
                    ToolOutcome::unchanged()
                }
            }
            (ToolState::Dragging, PointerEvent::Up(device) | PointerEvent::Leave(device)) => {
                self.state = ToolState::Idle;
                let had_shape = model.update_in_progress(camera.to_logical(device));
                let finalized = model.commit();
                ToolOutcome {
                    changed: had_shape,
                    finalized,
                }
            }
            (ToolState::Panning { anchor }, PointerEvent::Move(device)) => {
                let delta = device - anchor;
                self.state = ToolState::Panning { anchor: device };
                if delta.x == 0.0 && delta.y == 0.0 {
                    return ToolOutcome::unchanged();
                }
                camera.pan(delta);
                ToolOutcome::changed()
            }
            (ToolState::Panning { .. }, PointerEvent::Up(_) | PointerEvent::Leave(_)) => {
                self.state = ToolState::Idle;
                ToolOutcome::unchanged()
            }
            _ => ToolOutcome::unchanged(),
        }
    }

    fn begin(&mut self, device: Point, model: &mut ShapeModel, camera: &Camera) -> ToolOutcome {
        let logical = camera.to_logical(device);
        match self.current_tool {
            ToolKind::Pan => {
                self.state = ToolState::Panning { anchor: device };
                ToolOutcome::unchanged()
            }
            ToolKind::Text => {
                model.begin_shape(
                    ShapeKind::Text,
                    logical,
                    Some(TextExtra::new(self.staged_text.clone())),
                );
                let finalized = model.commit();
                ToolOutcome {
                    changed: finalized.is_some(),
                    finalized,
                }
            }
            ToolKind::Line | ToolKind::Circle | ToolKind::Rectangle => {
                if let Some(kind) = self.current_tool.shape_kind() {
                    model.begin_shape(kind, logical, None);
                    self.state = ToolState::Dragging;
                }
                ToolOutcome::changed()
            }
        }
    }
}
