use crate::geometry::SurfaceSize;
use crate::render::backend::{
    BackendKind, ContextId, PixelFormat, RenderContext, RgbaImage, SurfaceFrame, SurfaceOptions,
    SurfaceProvider,
};
use crate::render::RenderTarget;
use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Counters shared between a null context and everything created from it.
#[derive(Debug, Default)]
struct NullStats {
    presented: AtomicU64,
    next_frame_id: AtomicU64,
    fail_presents: AtomicBool,
}

/// Context that renders nothing. Presents are counted, and can be made to fail on demand.
pub struct NullContext {
    id: ContextId,
    valid: bool,
    stats: Arc<NullStats>,
}

impl Default for NullContext {
    fn default() -> Self {
        Self::new()
    }
}

impl NullContext {
    /// Creates a valid null context.
    pub fn new() -> Self {
        Self {
            id: ContextId::new(),
            valid: true,
            stats: Arc::new(NullStats::default()),
        }
    }

    /// Creates a context whose setup "failed".
    pub fn invalid() -> Self {
        Self { valid: false, ..Self::new() }
    }

    /// Number of frames presented through this context so far.
    pub fn presented_frames(&self) -> u64 {
        self.stats.presented.load(Ordering::SeqCst)
    }

    /// Makes every following present fail (or succeed again).
    pub fn set_fail_presents(&self, fail: bool) {
        self.stats.fail_presents.store(fail, Ordering::SeqCst);
    }

    /// A standalone frame of the given size, as if acquired from a surface.
    pub fn frame(&self, size: SurfaceSize) -> Box<dyn SurfaceFrame> {
        Box::new(NullFrame {
            size,
            frame_id: self.stats.next_frame_id.fetch_add(1, Ordering::SeqCst),
            stats: self.stats.clone(),
        })
    }
}

impl RenderContext for NullContext {
    fn name(&self) -> &str {
        "NullContext"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Null
    }

    fn id(&self) -> ContextId {
        self.id
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn create_surface(&self, size: SurfaceSize, _options: SurfaceOptions) -> Result<Box<dyn SurfaceProvider>> {
        if !self.valid {
            return Err(anyhow!("cannot create a surface on an invalid NullContext"));
        }
        Ok(Box::new(NullSurface::new(size, self.stats.clone())?))
    }
}

pub struct NullSurface {
    /// Size of the surface in pixels.
    size: SurfaceSize,
    stats: Arc<NullStats>,
}

impl NullSurface {
    fn new(size: SurfaceSize, stats: Arc<NullStats>) -> Result<Self> {
        if size.is_empty() {
            return Err(anyhow!("null surface needs a non-empty size, got {}x{}", size.width, size.height));
        }
        if size.byte_len().is_none() {
            return Err(anyhow!("null surface of {}x{} is too large to address", size.width, size.height));
        }
        Ok(Self { size, stats })
    }
}

impl SurfaceProvider for NullSurface {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn acquire_frame(&mut self) -> Option<Box<dyn SurfaceFrame>> {
        Some(Box::new(NullFrame {
            size: self.size,
            frame_id: self.stats.next_frame_id.fetch_add(1, Ordering::SeqCst),
            stats: self.stats.clone(),
        }))
    }

    fn snapshot(&self) -> Option<RgbaImage> {
        let pixels = vec![0u8; self.size.byte_len()?];
        Some(RgbaImage::from_raw(
            pixels,
            self.size.width,
            self.size.height,
            self.size.stride()?,
            PixelFormat::Rgba8,
        ))
    }
}

struct NullFrame {
    size: SurfaceSize,
    frame_id: u64,
    stats: Arc<NullStats>,
}

impl SurfaceFrame for NullFrame {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn frame_id(&self) -> u64 {
        self.frame_id
    }

    fn present(self: Box<Self>, target: RenderTarget) -> Result<()> {
        if self.stats.fail_presents.load(Ordering::SeqCst) {
            return Err(anyhow!("null present of frame {} failed on request", self.frame_id));
        }
        let (list, _) = target.finish();
        log::trace!("NullFrame {}: dropping {} ops", self.frame_id, list.len());
        self.stats.presented.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
