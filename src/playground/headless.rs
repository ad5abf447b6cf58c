use crate::config::PlaygroundConfig;
use crate::playground::PlaygroundImpl;
use crate::render::backends::null::NullContext;
use crate::render::backends::software::SoftwareContext;
use crate::render::{BackendKind, RenderContext, RgbaImage, SurfaceFrame, SurfaceOptions, SurfaceProvider};
use anyhow::{anyhow, Result};
use std::sync::Arc;

/// Playground "window" without a display: an offscreen surface on a CPU backend.
pub struct HeadlessPlayground {
    backend: BackendKind,
    context: Option<Arc<dyn RenderContext>>,
    surface: Option<Box<dyn SurfaceProvider>>,
}

impl HeadlessPlayground {
    pub fn new(backend: BackendKind) -> Self {
        Self { backend, context: None, surface: None }
    }
}

impl PlaygroundImpl for HeadlessPlayground {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    fn setup_window(&mut self, config: &PlaygroundConfig) -> Result<()> {
        let context: Arc<dyn RenderContext> = match self.backend {
            BackendKind::Software => Arc::new(SoftwareContext::new()),
            BackendKind::Null => Arc::new(NullContext::new()),
            kind => return Err(anyhow!("headless playground cannot drive {kind:?}")),
        };
        if config.enable_validation {
            log::info!("{} has no validation layers, ignoring enable_validation", context.name());
        }

        let surface = context.create_surface(config.window_size, SurfaceOptions::from(config))?;
        log::debug!("headless window \"{}\" on {}", config.title, context.name());

        self.context = Some(context);
        self.surface = Some(surface);
        Ok(())
    }

    fn teardown_window(&mut self) {
        if self.surface.take().is_some() {
            log::debug!("headless window torn down");
        }
        self.context = None;
    }

    fn context(&self) -> Option<Arc<dyn RenderContext>> {
        self.context.clone()
    }

    fn acquire_surface_frame(&mut self) -> Option<Box<dyn SurfaceFrame>> {
        self.surface.as_mut()?.acquire_frame()
    }

    fn snapshot(&self) -> Option<RgbaImage> {
        self.surface.as_ref()?.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_frames_before_setup_or_after_teardown() {
        let mut imp = HeadlessPlayground::new(BackendKind::Software);
        assert!(imp.acquire_surface_frame().is_none());
        assert!(imp.context().is_none());

        imp.setup_window(&PlaygroundConfig::default()).unwrap();
        assert!(imp.acquire_surface_frame().is_some());

        imp.teardown_window();
        assert!(imp.acquire_surface_frame().is_none());
    }

    #[test]
    fn refuses_gpu_kinds() {
        let mut imp = HeadlessPlayground::new(BackendKind::Metal);
        assert!(imp.setup_window(&PlaygroundConfig::default()).is_err());
    }
}
