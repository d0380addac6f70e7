//! Renderer abstraction.
//!
//! [`build_scene`] is a pure function from a [`RenderContext`] to a list of
//! [`DrawCommand`]s. A [`RenderTarget`] consumes those commands; what it draws
//! them with is up to the host.

use kurbo::{Affine, Circle, Line, Point, Rect, Size};
use peniko::Color;
use sketchroom_core::shapes::{DEFAULT_FONT_FAMILY, Shape, ShapeKind};
use sketchroom_core::sync::Transport;
use sketchroom_core::{Camera, Session};
use thiserror::Error;

/// Font size used when a text shape's size cannot be parsed.
const FALLBACK_FONT_SIZE: f64 = 16.0;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Render target unavailable")]
    TargetUnavailable,
    #[error("Render failed: {0}")]
    RenderFailed(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Colors and stroke width for a frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderStyle {
    /// Background color.
    pub background_color: Color,
    /// Stroke color for lines, circles and rectangles.
    pub stroke_color: Color,
    /// Stroke width in logical units.
    pub stroke_width: f64,
    /// Fill color for text.
    pub text_color: Color,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            background_color: Color::from_rgba8(255, 255, 255, 255),
            stroke_color: Color::from_rgba8(0, 0, 0, 255),
            stroke_width: 2.0,
            text_color: Color::from_rgba8(0, 0, 0, 255),
        }
    }
}

/// A single drawing operation.
///
/// Geometry is in logical coordinates; the preceding `SetTransform` maps it
/// to the device.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    /// Fill the whole viewport.
    Clear { color: Color, viewport: Size },
    /// Logical-to-device transform for the commands that follow.
    SetTransform(Affine),
    StrokeLine { line: Line, color: Color, width: f64 },
    StrokeCircle { circle: Circle, color: Color, width: f64 },
    StrokeRect { rect: Rect, color: Color, width: f64 },
    /// Text anchored at its top-left corner.
    FillText {
        origin: Point,
        text: String,
        font_size: f64,
        font_family: String,
        color: Color,
    },
}

/// Snapshot of everything a frame draws.
pub struct RenderContext<'a> {
    /// Committed shapes in commit order.
    pub shapes: &'a [Shape],
    /// The shape currently being drawn, if any.
    pub in_progress: Option<&'a Shape>,
    /// Logical-to-device transform.
    pub transform: Affine,
    /// Viewport size in device pixels.
    pub viewport_size: Size,
    pub style: RenderStyle,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context.
    pub fn new(
        shapes: &'a [Shape],
        in_progress: Option<&'a Shape>,
        camera: &Camera,
        viewport_size: Size,
    ) -> Self {
        Self {
            shapes,
            in_progress,
            transform: camera.transform(),
            viewport_size,
            style: RenderStyle::default(),
        }
    }

    /// Capture the current state of a session.
    pub fn from_session<T: Transport>(session: &'a Session<T>, viewport_size: Size) -> Self {
        Self::new(
            session.model().shapes(),
            session.model().in_progress(),
            session.camera(),
            viewport_size,
        )
    }

    /// Set the style.
    pub fn with_style(mut self, style: RenderStyle) -> Self {
        self.style = style;
        self
    }
}

/// Parse a CSS-style font size such as `"16px"`.
pub fn parse_font_size(size: &str) -> Option<f64> {
    let size = size.trim();
    let number = size.strip_suffix("px").unwrap_or(size).trim();
    number
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
}

fn shape_command(shape: &Shape, style: &RenderStyle) -> Option<DrawCommand> {
    let width = style.stroke_width;
    let color = style.stroke_color;
    match shape.kind {
        ShapeKind::Line => Some(DrawCommand::StrokeLine {
            line: shape.as_line(),
            color,
            width,
        }),
        ShapeKind::Circle => Some(DrawCommand::StrokeCircle {
            circle: shape.as_circle(),
            color,
            width,
        }),
        ShapeKind::Rectangle => Some(DrawCommand::StrokeRect {
            rect: shape.as_rect(),
            color,
            width,
        }),
        ShapeKind::Text => {
            // Remote peers may send text shapes without content.
            if !shape.has_content() {
                return None;
            }
            let font_size = shape
                .font_size
                .as_deref()
                .and_then(parse_font_size)
                .unwrap_or(FALLBACK_FONT_SIZE);
            Some(DrawCommand::FillText {
                origin: shape.start(),
                text: shape.text.clone().unwrap_or_default(),
                font_size,
                font_family: shape
                    .font_family
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
                color: style.text_color,
            })
        }
    }
}

/// Build the draw commands for a frame.
///
/// Committed shapes are drawn in commit order, then the in-progress shape on top.
pub fn build_scene(ctx: &RenderContext) -> Vec<DrawCommand> {
    let mut commands = Vec::with_capacity(ctx.shapes.len() + 3);
    commands.push(DrawCommand::Clear {
        color: ctx.style.background_color,
        viewport: ctx.viewport_size,
    });
    commands.push(DrawCommand::SetTransform(ctx.transform));

    commands.extend(
        ctx.shapes
            .iter()
            .chain(ctx.in_progress)
            .filter_map(|shape| shape_command(shape, &ctx.style)),
    );
    commands
}

/// A drawing surface that executes draw commands.
pub trait RenderTarget {
    /// Whether the surface currently has a drawing context.
    fn is_available(&self) -> bool;

    /// Draw one frame.
    fn submit(&mut self, commands: &[DrawCommand]) -> RenderResult<()>;
}

/// Render target that keeps every submitted frame.
#[derive(Debug, Clone)]
pub struct RecordingTarget {
    frames: Vec<Vec<DrawCommand>>,
    available: bool,
}

impl Default for RecordingTarget {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            available: true,
        }
    }
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the surface being torn down or restored.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn frames(&self) -> &[Vec<DrawCommand>] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&[DrawCommand]> {
        self.frames.last().map(Vec::as_slice)
    }
}

impl RenderTarget for RecordingTarget {
    fn is_available(&self) -> bool {
        self.available
    }

    fn submit(&mut self, commands: &[DrawCommand]) -> RenderResult<()> {
        if !self.available {
            return Err(RendererError::TargetUnavailable);
        }
        self.frames.push(commands.to_vec());
        Ok(())
    }
}

/// Run one frame tick.
///
/// Draws only when the session has pending changes, so any number of
/// mutations between ticks cost a single redraw. Returns whether a frame was
/// drawn. When the target is unavailable the frame is skipped and the session
/// stays dirty, so the next tick retries.
pub fn render_frame<T: Transport, R: RenderTarget + ?Sized>(
    session: &mut Session<T>,
    target: &mut R,
    style: RenderStyle,
    viewport_size: Size,
) -> RenderResult<bool> {
    if !session.needs_redraw() {
        return Ok(false);
    }
    if !target.is_available() {
        log::warn!("Render target unavailable, skipping frame");
        return Err(RendererError::TargetUnavailable);
    }

    let ctx = RenderContext::from_session(session, viewport_size).with_style(style);
    let commands = build_scene(&ctx);
    if let Err(e) = target.submit(&commands) {
        log::warn!("Frame skipped: {}", e);
        return Err(e);
    }
    session.take_redraw();
    log::trace!("Drew frame with {} commands", commands.len());
    Ok(true)
}
