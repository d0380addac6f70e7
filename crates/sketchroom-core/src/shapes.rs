//! Shape definitions for the whiteboard.
//!
//! A [`Shape`] is both the unit of drawing and the unit of wire transfer, so
//! its serde representation is the JSON object peers exchange:
//! `{ type, startX, startY, endX, endY, text?, fontSize?, fontFamily? }`.

use kurbo::{Circle, Line, Point, Rect};
use serde::{Deserialize, Serialize};

/// Font size applied to every text shape.
pub const DEFAULT_FONT_SIZE: &str = "16px";

/// Font family applied to every text shape.
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// The primitive a shape draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Line,
    Circle,
    Rectangle,
    Text,
}

impl ShapeKind {
    /// Wire name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Line => "line",
            ShapeKind::Circle => "circle",
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Text => "text",
        }
    }
}

/// Text payload attached to a text shape when it is begun.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextExtra {
    pub text: String,
    pub font_size: String,
    pub font_family: String,
}

impl TextExtra {
    /// Text content with the fixed default font.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: DEFAULT_FONT_SIZE.to_string(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
        }
    }
}

/// A drawn primitive in logical coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

impl Shape {
    /// Create a shape anchored at `start` whose terminus is also `start`.
    pub fn new(kind: ShapeKind, start: Point) -> Self {
        Self {
            kind,
            start_x: start.x,
            start_y: start.y,
            end_x: start.x,
            end_y: start.y,
            text: None,
            font_size: None,
            font_family: None,
        }
    }

    /// Create a shape from both of its points.
    pub fn from_points(kind: ShapeKind, start: Point, end: Point) -> Self {
        let mut shape = Self::new(kind, start);
        shape.set_end(end);
        shape
    }

    /// Create a text shape at `origin`.
    pub fn text(origin: Point, extra: TextExtra) -> Self {
        Self::new(ShapeKind::Text, origin).with_extra(extra)
    }

    /// Attach text content and font. Ignored for non-text kinds.
    pub fn with_extra(mut self, extra: TextExtra) -> Self {
        if self.kind == ShapeKind::Text {
            self.text = Some(extra.text);
            self.font_size = Some(extra.font_size);
            self.font_family = Some(extra.font_family);
        }
        self
    }

    pub fn start(&self) -> Point {
        Point::new(self.start_x, self.start_y)
    }

    pub fn end(&self) -> Point {
        Point::new(self.end_x, self.end_y)
    }

    pub(crate) fn set_end(&mut self, end: Point) {
        self.end_x = end.x;
        self.end_y = end.y;
    }

    /// Circle radius: the distance from start to end.
    pub fn radius(&self) -> f64 {
        self.start().distance(self.end())
    }

    /// Line segment from start to end.
    pub fn as_line(&self) -> Line {
        Line::new(self.start(), self.end())
    }

    /// Circle centred on start passing through end.
    pub fn as_circle(&self) -> Circle {
        Circle::new(self.start(), self.radius())
    }

    /// Rectangle spanned by the two corners, whatever their order.
    pub fn as_rect(&self) -> Rect {
        Rect::from_points(self.start(), self.end())
    }

    /// Whether a committed shape would carry drawable content.
    ///
    /// Text shapes need non-blank text; geometric shapes always qualify.
    pub fn has_content(&self) -> bool {
        match self.kind {
            ShapeKind::Text => self
                .text
                .as_deref()
                .is_some_and(|text| !text.trim().is_empty()),
            ShapeKind::Line | ShapeKind::Circle | ShapeKind::Rectangle => true,
        }
    }

    /// Logical-space bounds of the geometry. Text reports its anchor point.
    pub fn bounds(&self) -> Rect {
        match self.kind {
            ShapeKind::Line | ShapeKind::Rectangle => self.as_rect(),
            ShapeKind::Circle => {
                let r = self.radius();
                Rect::new(
                    self.start_x - r,
                    self.start_y - r,
                    self.start_x + r,
                    self.start_y + r,
                )
            }
            ShapeKind::Text => Rect::from_points(self.start(), self.start()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_shape_collapsed() {
        let shape = Shape::new(ShapeKind::Line, Point::new(3.0, 4.0));
        assert_eq!(shape.start(), shape.end());
        assert!(shape.text.is_none());
    }

    #[test]
    fn test_serialize_line() {
        let shape = Shape::from_points(ShapeKind::Line, Point::new(0.0, 0.0), Point::new(5.0, 5.0));
        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "line",
                "startX": 0.0,
                "startY": 0.0,
                "endX": 5.0,
                "endY": 5.0
            })
        );
    }

    #[test]
    fn test_serialize_text_fields() {
        let shape = Shape::text(Point::new(10.0, 20.0), TextExtra::new("hello"));
        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hello");
        assert_eq!(json["fontSize"], "16px");
        assert_eq!(json["fontFamily"], "Arial");
    }

    #[test]
    fn test_deserialize_integer_coordinates() {
        let shape: Shape =
            serde_json::from_str(r#"{"type":"circle","startX":1,"startY":2,"endX":4,"endY":6}"#)
                .unwrap();
        assert_eq!(shape.kind, ShapeKind::Circle);
        assert!((shape.radius() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deserialize_rejects_unknown_kind() {
        let result: Result<Shape, _> =
            serde_json::from_str(r#"{"type":"pan","startX":1,"startY":2,"endX":4,"endY":6}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_rect_negative_extent() {
        let shape = Shape::from_points(
            ShapeKind::Rectangle,
            Point::new(50.0, 40.0),
            Point::new(10.0, 10.0),
        );
        let rect = shape.as_rect();
        assert_eq!(rect, Rect::new(10.0, 10.0, 50.0, 40.0));
    }

    #[test]
    fn test_has_content() {
        assert!(Shape::new(ShapeKind::Rectangle, Point::ZERO).has_content());
        assert!(Shape::text(Point::ZERO, TextExtra::new("hi")).has_content());
        assert!(!Shape::text(Point::ZERO, TextExtra::new("")).has_content());
        assert!(!Shape::text(Point::ZERO, TextExtra::new(" \t\n")).has_content());
        assert!(!Shape::new(ShapeKind::Text, Point::ZERO).has_content());
    }

    #[test]
    fn test_extra_ignored_for_geometry() {
        let shape = Shape::new(ShapeKind::Line, Point::ZERO).with_extra(TextExtra::new("x"));
        assert!(shape.text.is_none());
        assert!(shape.font_size.is_none());
    }

    #[test]
    fn test_circle_bounds() {
        let shape =
            Shape::from_points(ShapeKind::Circle, Point::new(0.0, 0.0), Point::new(3.0, 4.0));
        assert_eq!(shape.bounds(), Rect::new(-5.0, -5.0, 5.0, 5.0));
    }
}
