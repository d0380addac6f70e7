//! SketchRoom Render Library
//!
//! Turns a session's shapes, in-progress shape and view transform into a
//! flat list of draw commands, and drives a render target once per frame.

mod renderer;

pub use renderer::{
    DrawCommand, RecordingTarget, RenderContext, RenderResult, RenderStyle, RenderTarget,
    RendererError, build_scene, parse_font_size, render_frame,
};
