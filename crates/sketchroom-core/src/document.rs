//! The shape model: committed shapes plus the one being drawn.

use kurbo::Point;

use crate::shapes::{Shape, ShapeKind, TextExtra};

/// Append-only sequence of committed shapes and at most one in-progress shape.
///
/// Committed shapes are never mutated. Order is local arrival order: local
/// commits in gesture-completion order interleaved with remote shapes in the
/// order they were received.
#[derive(Debug, Clone, Default)]
pub struct ShapeModel {
    shapes: Vec<Shape>,
    in_progress: Option<Shape>,
}

impl ShapeModel {
    /// Create a new empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new in-progress shape at a logical point.
    ///
    /// `extra` only applies to text shapes. A shape already in progress is
    /// replaced.
    pub fn begin_shape(&mut self, kind: ShapeKind, at: Point, extra: Option<TextExtra>) -> &Shape {
        let mut shape = Shape::new(kind, at);
        if let Some(extra) = extra {
            shape = shape.with_extra(extra);
        }
        if let Some(previous) = self.in_progress.take() {
            log::debug!("Replacing unfinished {} shape", previous.kind.name());
        }
        self.in_progress.insert(shape)
    }

    /// Move the terminus of the in-progress shape. Returns false if nothing is in progress.
    pub fn update_in_progress(&mut self, at: Point) -> bool {
        match self.in_progress.as_mut() {
            Some(shape) => {
                shape.set_end(at);
                true
            }
            None => false,
        }
    }

    /// Commit the in-progress shape.
    ///
    /// Returns the committed shape, or `None` if nothing was in progress or
    /// the shape had no content (blank text), in which case it is discarded.
    pub fn commit(&mut self) -> Option<Shape> {
        let shape = self.in_progress.take()?;
        if !shape.has_content() {
            log::debug!("Discarding {} shape without content", shape.kind.name());
            return None;
        }
        self.shapes.push(shape.clone());
        Some(shape)
    }

    /// Append a shape received from a peer. Never touches the in-progress shape.
    pub fn append_remote(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    /// Drop every shape, committed and in progress.
    pub fn clear(&mut self) {
        self.shapes.clear();
        self.in_progress = None;
    }

    /// Committed shapes in insertion order.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// The shape currently being drawn, if any.
    pub fn in_progress(&self) -> Option<&Shape> {
        self.in_progress.as_ref()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
