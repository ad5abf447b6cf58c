use crate::errors::InteropError;
use crate::geometry::SurfaceSize;
use crate::interop::{Context, DisplayList, ScopedObject};
use crate::render::{RgbaImage, SurfaceOptions, SurfaceProvider};
use std::sync::Mutex;

/// A drawable surface. Keeps its context alive for as long as it exists.
pub struct Surface {
    context: ScopedObject<Context>,
    provider: Mutex<Box<dyn SurfaceProvider>>,
    size: SurfaceSize,
}

impl Surface {
    /// Creates an offscreen surface backed by the context's backend.
    pub fn create_offscreen(
        context: &ScopedObject<Context>,
        size: SurfaceSize,
        options: SurfaceOptions,
    ) -> Result<ScopedObject<Surface>, InteropError> {
        let ctx = context.get().ok_or(InteropError::InvalidContext)?;
        if !ctx.is_valid() {
            return Err(InteropError::InvalidContext);
        }
        let provider = ctx
            .backend_context()
            .create_surface(size, options)
            .map_err(|e| InteropError::BackendSetup(format!("{e:#}")))?;
        Ok(Self::wrap(context, provider))
    }

    /// Wraps a surface provider created elsewhere, e.g. by a playground window.
    pub fn wrap(context: &ScopedObject<Context>, provider: Box<dyn SurfaceProvider>) -> ScopedObject<Surface> {
        let size = provider.size();
        ScopedObject::create(Surface {
            context: context.clone(),
            provider: Mutex::new(provider),
            size,
        })
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn context(&self) -> &ScopedObject<Context> {
        &self.context
    }

    /// Draws `list` into the next frame and presents it. Returns false if nothing was presented.
    pub fn draw_display_list(&self, list: &DisplayList) -> bool {
        let Some(ctx) = self.context.get() else {
            return false;
        };
        let frame = match self.provider.lock() {
            Ok(mut provider) => provider.acquire_frame(),
            Err(_) => {
                log::error!("surface provider lock poisoned");
                return false;
            }
        };
        ctx.renderer().render(frame, |target| {
            target.encoder().draw_display_list(list);
            true
        })
    }

    /// Pixels of the last presented frame, when the backend can read them back.
    pub fn snapshot(&self) -> Option<RgbaImage> {
        self.provider.lock().ok()?.snapshot()
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface").field("size", &self.size).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Color, Rect};
    use crate::interop::{DisplayListBuilder, Paint};
    use crate::version::IMPELLER_VERSION;

    #[test]
    fn draws_into_software_surface() {
        let ctx = Context::create_software(IMPELLER_VERSION, 3).unwrap();
        let surface = Surface::create_offscreen(&ctx, SurfaceSize::new(16, 16), SurfaceOptions::default()).unwrap();
        let surface = surface.get().unwrap();

        let paint = ScopedObject::create(Paint::new(Color::WHITE));
        let mut builder = DisplayListBuilder::new();
        builder.clear(Color::BLACK);
        builder.draw_rect(Rect::new(0.0, 0.0, 8.0, 16.0), &paint);
        assert!(surface.draw_display_list(&builder.take()));

        let image = surface.snapshot().unwrap();
        assert_eq!(image.pixel(2, 2), Some([255, 255, 255, 255]));
        assert_eq!(image.pixel(12, 2), Some([0, 0, 0, 255]));
    }

    #[test]
    fn surface_keeps_context_alive() {
        let mut ctx = Context::create_null(IMPELLER_VERSION, 1).unwrap();
        let surface = Surface::create_offscreen(&ctx, SurfaceSize::new(4, 4), SurfaceOptions::default()).unwrap();
        assert_eq!(ctx.ref_count(), 2);
        ctx.reset();

        let list = DisplayListBuilder::new().take();
        assert!(surface.get().unwrap().draw_display_list(&list));
    }

    #[test]
    fn empty_size_fails_setup() {
        let ctx = Context::create_software(IMPELLER_VERSION, 1).unwrap();
        let err = Surface::create_offscreen(&ctx, SurfaceSize::new(0, 0), SurfaceOptions::default()).unwrap_err();
        assert!(matches!(err, InteropError::BackendSetup(_)));
    }

    #[test]
    fn oversized_surface_fails_setup() {
        let ctx = Context::create_software(IMPELLER_VERSION, 1).unwrap();
        let size = SurfaceSize::new(40000, 30000);
        let err = Surface::create_offscreen(&ctx, size, SurfaceOptions::default()).unwrap_err();
        assert!(matches!(err, InteropError::BackendSetup(msg) if msg.contains("too large")));
    }
}
