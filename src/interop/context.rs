use crate::errors::InteropError;
use crate::interop::ScopedObject;
use crate::render::backends::null::NullContext;
use crate::render::backends::software::SoftwareContext;
use crate::render::{BackendKind, RenderContext, Renderer};
use crate::version::check_version;
use std::sync::Arc;

/// A backend context together with the renderer that paces frames submitted through it.
///
/// Every surface created from a context shares its renderer, so the frames-in-flight limit
/// applies across all of them.
pub struct Context {
    backend: Arc<dyn RenderContext>,
    renderer: Renderer,
}

impl Context {
    /// Wraps an existing backend context. Fails if the caller was built against another version
    /// of the API, or if the backend did not set up correctly.
    pub fn create(
        version: u32,
        backend: Arc<dyn RenderContext>,
        max_frames_in_flight: usize,
    ) -> Result<ScopedObject<Context>, InteropError> {
        check_version(version)?;
        if !backend.is_valid() {
            log::error!("{} failed to set up, refusing to create a context", backend.name());
            return Err(InteropError::InvalidContext);
        }

        let renderer = Renderer::new(backend.clone(), max_frames_in_flight);
        if !renderer.is_valid() {
            return Err(InteropError::InvalidContext);
        }

        log::debug!(
            "created {} context {:?} with {} frames in flight",
            backend.name(),
            backend.id(),
            max_frames_in_flight
        );
        Ok(ScopedObject::create(Context { backend, renderer }))
    }

    pub fn create_software(version: u32, max_frames_in_flight: usize) -> Result<ScopedObject<Context>, InteropError> {
        Self::create(version, Arc::new(SoftwareContext::new()), max_frames_in_flight)
    }

    pub fn create_null(version: u32, max_frames_in_flight: usize) -> Result<ScopedObject<Context>, InteropError> {
        Self::create(version, Arc::new(NullContext::new()), max_frames_in_flight)
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn backend_context(&self) -> &Arc<dyn RenderContext> {
        &self.backend
    }

    pub fn backend(&self) -> BackendKind {
        self.backend.backend()
    }

    pub fn is_valid(&self) -> bool {
        self.renderer.is_valid()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        log::debug!("dropping {} context {:?}", self.backend.name(), self.backend.id());
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("backend", &self.backend.backend())
            .field("id", &self.backend.id())
            .field("max_frames_in_flight", &self.renderer.max_frames_in_flight())
            .finish()
    }
}
