//! Playground harness: sets up a backend and a window, then drives frames through a [`Renderer`].
//!
//! ```
//! use impeller_toolkit::config::PlaygroundConfig;
//! use impeller_toolkit::geometry::Color;
//! use impeller_toolkit::playground::Playground;
//! use impeller_toolkit::render::BackendKind;
//!
//! let config = PlaygroundConfig::builder()
//!     .backend(BackendKind::Null)
//!     .window_size(64, 64)
//!     .build()
//!     .unwrap();
//! let mut playground = Playground::new(config).unwrap();
//! let stats = playground.run_frames(3, |target| {
//!     target.encoder().clear(Color::BLACK);
//!     true
//! });
//! assert_eq!(stats.presented, 3);
//! ```

mod headless;

pub use headless::HeadlessPlayground;

use crate::config::PlaygroundConfig;
use crate::errors::InteropError;
use crate::render::{BackendKind, RenderContext, RenderTarget, Renderer, RgbaImage, SurfaceFrame};
use std::sync::Arc;

/// A platform specific window with a render context attached to it.
pub trait PlaygroundImpl: Send {
    fn backend(&self) -> BackendKind;

    /// Creates the window and its surface. Called once before any frame is acquired.
    fn setup_window(&mut self, config: &PlaygroundConfig) -> anyhow::Result<()>;

    /// Destroys the window. Further frame acquisitions return `None`.
    fn teardown_window(&mut self);

    /// The context frames render with. `None` until the window is set up.
    fn context(&self) -> Option<Arc<dyn RenderContext>>;

    /// The next frame of the window's surface, or `None` if there is none to draw into.
    fn acquire_surface_frame(&mut self) -> Option<Box<dyn SurfaceFrame>>;

    /// Pixels currently on screen, if the implementation can read them back.
    fn snapshot(&self) -> Option<RgbaImage> {
        None
    }
}

/// Picks the playground implementation for the configured backend.
pub fn create_playground_impl(config: &PlaygroundConfig) -> Result<Box<dyn PlaygroundImpl>, InteropError> {
    match config.backend {
        BackendKind::Software | BackendKind::Null => Ok(Box::new(HeadlessPlayground::new(config.backend))),
        kind => {
            log::error!("playground backend {kind:?} is not available in this build");
            Err(InteropError::UnsupportedBackend(kind))
        }
    }
}

/// Outcome of a frame loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaygroundStats {
    pub presented: u64,
    pub failed: u64,
}

pub struct Playground {
    config: PlaygroundConfig,
    imp: Box<dyn PlaygroundImpl>,
    renderer: Renderer,
}

impl Playground {
    pub fn new(config: PlaygroundConfig) -> Result<Self, InteropError> {
        let imp = create_playground_impl(&config)?;
        Self::with_impl(config, imp)
    }

    /// Sets up a playground on a caller supplied implementation.
    pub fn with_impl(config: PlaygroundConfig, mut imp: Box<dyn PlaygroundImpl>) -> Result<Self, InteropError> {
        crate::config::validate(&config)?;
        imp.setup_window(&config)
            .map_err(|e| InteropError::BackendSetup(format!("{e:#}")))?;

        let Some(context) = imp.context() else {
            imp.teardown_window();
            return Err(InteropError::InvalidContext);
        };
        let renderer = Renderer::new(context, config.max_frames_in_flight);
        if !renderer.is_valid() {
            imp.teardown_window();
            return Err(InteropError::InvalidContext);
        }

        log::info!(
            "playground \"{}\" up: {:?} {}x{}",
            config.title,
            imp.backend(),
            config.window_size.width,
            config.window_size.height
        );
        Ok(Self { config, imp, renderer })
    }

    pub fn config(&self) -> &PlaygroundConfig {
        &self.config
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn snapshot(&self) -> Option<RgbaImage> {
        self.imp.snapshot()
    }

    /// Renders one frame. False if it was not presented.
    pub fn render_frame<F>(&mut self, callback: F) -> bool
    where
        F: FnOnce(&mut RenderTarget) -> bool,
    {
        let frame = self.imp.acquire_surface_frame();
        self.renderer.render(frame, callback)
    }

    /// Renders `frames` frames. Failed frames are logged and the loop carries on.
    pub fn run_frames<F>(&mut self, frames: u64, mut callback: F) -> PlaygroundStats
    where
        F: FnMut(&mut RenderTarget) -> bool,
    {
        let mut remaining = frames;
        self.run_until(
            || {
                if remaining == 0 {
                    return true;
                }
                remaining -= 1;
                false
            },
            &mut callback,
        )
    }

    /// Renders frames until `should_close` returns true. Checked before every frame.
    pub fn run_until<C, F>(&mut self, mut should_close: C, mut callback: F) -> PlaygroundStats
    where
        C: FnMut() -> bool,
        F: FnMut(&mut RenderTarget) -> bool,
    {
        let mut stats = PlaygroundStats::default();
        while !should_close() {
            if self.render_frame(&mut callback) {
                stats.presented += 1;
            } else {
                stats.failed += 1;
                log::warn!("playground frame {} was not presented", stats.presented + stats.failed);
            }
        }
        log::debug!("playground loop done: {stats:?}");
        stats
    }
}

impl Drop for Playground {
    fn drop(&mut self) {
        self.imp.teardown_window();
    }
}
