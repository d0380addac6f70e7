//! Camera module for pan/zoom transforms.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

use crate::config::ViewConfig;

/// Camera manages the view transform for the canvas.
///
/// Device coordinates are raw pointer positions on the drawing surface;
/// logical coordinates are where shapes live, independent of pan and zoom.
/// `device = logical * zoom + offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Current translation offset (pan), in device space.
    pub offset: Vec2,
    /// Current zoom factor.
    pub zoom: f64,
    /// Minimum allowed zoom factor.
    pub min_zoom: f64,
    /// Maximum allowed zoom factor.
    pub max_zoom: f64,
    /// Amount added or removed by a single zoom step.
    pub zoom_step: f64,
    initial_zoom: f64,
}

/// Like `f64::clamp`, but never panics on an inverted range.
fn clamp_zoom(zoom: f64, min: f64, max: f64) -> f64 {
    zoom.max(min).min(max)
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_valid(&ViewConfig::default())
    }
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a camera using the zoom bounds and step from a view config.
    ///
    /// An invalid config falls back to the default view, so the zoom factor
    /// always stays positive.
    pub fn with_config(config: &ViewConfig) -> Self {
        match config.validate() {
            Ok(()) => Self::from_valid(config),
            Err(e) => {
                log::warn!("{}, using the default view", e);
                Self::default()
            }
        }
    }

    fn from_valid(config: &ViewConfig) -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: clamp_zoom(config.initial_zoom, config.min_zoom, config.max_zoom),
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            zoom_step: config.zoom_step,
            initial_zoom: config.initial_zoom,
        }
    }

    /// Get the affine transform for rendering.
    ///
    /// This transform converts logical coordinates to device coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Get the inverse transform for input handling.
    ///
    /// This transform converts device coordinates to logical coordinates.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    /// Convert a device point to logical coordinates.
    pub fn to_logical(&self, device: Point) -> Point {
        Point::new(
            (device.x - self.offset.x) / self.zoom,
            (device.y - self.offset.y) / self.zoom,
        )
    }

    /// Convert a logical point to device coordinates.
    pub fn to_device(&self, logical: Point) -> Point {
        Point::new(
            logical.x * self.zoom + self.offset.x,
            logical.y * self.zoom + self.offset.y,
        )
    }

    /// Pan the camera by a delta in device coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Step the zoom factor up. Returns false when already at the maximum.
    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.zoom + self.zoom_step)
    }

    /// Step the zoom factor down. Returns false when already at the minimum.
    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.zoom - self.zoom_step)
    }

    fn set_zoom(&mut self, requested: f64) -> bool {
        let new_zoom = clamp_zoom(requested, self.min_zoom, self.max_zoom);
        if new_zoom == self.zoom {
            return false;
        }
        self.zoom = new_zoom;
        true
    }

    /// Reset camera to default position and zoom.
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.zoom = clamp_zoom(self.initial_zoom, self.min_zoom, self.max_zoom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera() {
        let camera = Camera::new();
        assert_eq!(camera.offset, Vec2::ZERO);
        assert!((camera.zoom - 1.0).abs() < f64::EPSILON);
        assert!((camera.min_zoom - 0.1).abs() < f64::EPSILON);
        assert!((camera.max_zoom - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_to_logical_identity() {
        let camera = Camera::new();
        let device = Point::new(100.0, 200.0);
        let logical = camera.to_logical(device);
        assert!((logical.x - device.x).abs() < f64::EPSILON);
        assert!((logical.y - device.y).abs() < f64::EPSILON);
    }

    #[test]
    fn test_to_logical_with_offset_and_zoom() {
        let mut camera = Camera::new();
        camera.offset = Vec2::new(50.0, 100.0);
        camera.zoom = 2.0;
        let logical = camera.to_logical(Point::new(150.0, 300.0));
        assert!((logical.x - 50.0).abs() < f64::EPSILON);
        assert!((logical.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_affine_matches_point_conversion() {
        let mut camera = Camera::new();
        camera.offset = Vec2::new(-12.5, 40.0);
        camera.zoom = 1.7;
        let p = Point::new(33.0, -8.0);
        let a = camera.transform() * p;
        let b = camera.to_device(p);
        assert!((a.x - b.x).abs() < 1e-9);
        assert!((a.y - b.y).abs() < 1e-9);
        let c = camera.inverse_transform() * b;
        assert!((c.x - p.x).abs() < 1e-9);
        assert!((c.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let offsets = [Vec2::ZERO, Vec2::new(30.0, -20.0), Vec2::new(-1e4, 7.25)];
        let zooms = [0.1, 0.3, 1.0, 1.5, 5.0];
        let points = [
            Point::new(0.0, 0.0),
            Point::new(123.0, 456.0),
            Point::new(-987.654, 0.001),
            Point::new(1e6, -1e6),
        ];

        for offset in offsets {
            for zoom in zooms {
                let mut camera = Camera::new();
                camera.offset = offset;
                camera.zoom = zoom;
                for original in points {
                    let back = camera.to_device(camera.to_logical(original));
                    let tolerance = 1e-9 * original.x.abs().max(original.y.abs()).max(1.0);
                    assert!((back.x - original.x).abs() < tolerance);
                    assert!((back.y - original.y).abs() < tolerance);
                }
            }
        }
    }

    #[test]
    fn test_zoom_in_clamps_at_max() {
        let mut camera = Camera::new();
        for _ in 0..100 {
            camera.zoom_in();
            assert!(camera.zoom <= 5.0);
        }
        assert!((camera.zoom - 5.0).abs() < f64::EPSILON);
        assert!(!camera.zoom_in());
    }

    #[test]
    fn test_zoom_out_clamps_at_min() {
        let mut camera = Camera::new();
        for _ in 0..100 {
            camera.zoom_out();
            assert!(camera.zoom >= 0.1);
        }
        assert!((camera.zoom - 0.1).abs() < f64::EPSILON);
        assert!(!camera.zoom_out());
    }

    #[test]
    fn test_zoom_step() {
        let mut camera = Camera::new();
        assert!(camera.zoom_in());
        assert!((camera.zoom - 1.1).abs() < 1e-12);
        assert!(camera.zoom_out());
        assert!(camera.zoom_out());
        assert!((camera.zoom - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_pan_leaves_zoom() {
        let mut camera = Camera::new();
        camera.zoom_in();
        let zoom = camera.zoom;
        camera.pan(Vec2::new(10.0, 20.0));
        camera.pan(Vec2::new(-4.0, 1.0));
        assert!((camera.offset.x - 6.0).abs() < f64::EPSILON);
        assert!((camera.offset.y - 21.0).abs() < f64::EPSILON);
        assert!((camera.zoom - zoom).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset() {
        let mut camera = Camera::new();
        camera.pan(Vec2::new(5.0, 5.0));
        camera.zoom_in();
        camera.reset();
        assert_eq!(camera.offset, Vec2::ZERO);
        assert!((camera.zoom - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_config_uses_default_view() {
        let config = ViewConfig {
            min_zoom: 0.0,
            ..ViewConfig::default()
        };
        let mut camera = Camera::with_config(&config);
        assert_eq!(camera, Camera::new());

        for _ in 0..100 {
            camera.zoom_out();
        }
        assert!((camera.zoom - 0.1).abs() < 1e-9);
        let logical = camera.to_logical(Point::new(10.0, 20.0));
        assert!(logical.x.is_finite() && logical.y.is_finite());
    }
}
