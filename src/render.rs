//! Rendering: backend traits, the frame renderer and the bundled backends.

pub mod backend;
pub mod damage;

/// Rendering backends.
pub mod backends {
    /// Backend that presents nothing
    pub mod null;
    /// CPU rasterizer backend
    pub mod software;
}

mod renderer;
mod target;

pub use backend::{
    BackendKind, ContextId, PixelFormat, RenderContext, RgbaImage, SurfaceFrame, SurfaceOptions,
    SurfaceProvider,
};
pub use renderer::{FrameState, Renderer, DEFAULT_MAX_FRAMES_IN_FLIGHT, MAX_FRAMES_IN_FLIGHT};
pub use target::RenderTarget;
