use crate::config::MAX_SWAPCHAIN_IMAGES;
use crate::geometry::{join_rects, Rect, SurfaceSize};
use crate::render::backend::{
    BackendKind, ContextId, PixelFormat, RenderContext, RgbaImage, SurfaceFrame, SurfaceOptions,
    SurfaceProvider,
};
use crate::render::damage::{DamageTracker, FramebufferId, SwapStrategy};
use crate::render::RenderTarget;
use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};

mod raster;

use raster::Canvas;

/// CPU rendering context. Always valid.
#[derive(Debug, Default)]
pub struct SoftwareContext {
    id: ContextId,
}

impl SoftwareContext {
    pub fn new() -> Self {
        Self { id: ContextId::new() }
    }
}

impl RenderContext for SoftwareContext {
    fn name(&self) -> &str {
        "SoftwareContext"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Software
    }

    fn id(&self) -> ContextId {
        self.id
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn create_surface(&self, size: SurfaceSize, options: SurfaceOptions) -> Result<Box<dyn SurfaceProvider>> {
        Ok(Box::new(SoftwareSurface::new(size, options)?))
    }
}

struct SwapchainImage {
    fbo: FramebufferId,
    pixels: Vec<u8>,
    /// Value of `Swapchain::presents` right after this image was last presented.
    presented_at: Option<u64>,
}

struct Swapchain {
    size: SurfaceSize,
    images: Vec<SwapchainImage>,
    next_image: usize,
    presents: u64,
    front: Option<usize>,
    damage: DamageTracker,
    last_swap: Option<SwapStrategy>,
    last_repaint: Option<Rect>,
}

/// Offscreen swapchain of RGBA8 images in system memory.
///
/// Presents cycle through the images round robin. Each image keeps the pixels it was last
/// presented with, so a frame only repaints what changed since that image was on screen (see
/// [`DamageTracker`]). The image, and with it the buffer age, is picked when the frame is
/// presented, so frames in flight at the same time never see a stale age.
pub struct SoftwareSurface {
    size: SurfaceSize,
    swapchain: Arc<Mutex<Swapchain>>,
    next_frame_id: u64,
}

impl SoftwareSurface {
    pub fn new(size: SurfaceSize, options: SurfaceOptions) -> Result<Self> {
        if size.is_empty() {
            return Err(anyhow!("software surface needs a non-empty size, got {}x{}", size.width, size.height));
        }
        if options.image_count == 0 || options.image_count > MAX_SWAPCHAIN_IMAGES {
            return Err(anyhow!(
                "software surface needs 1..={} images, got {}",
                MAX_SWAPCHAIN_IMAGES,
                options.image_count
            ));
        }

        let Some(len) = size.byte_len() else {
            return Err(anyhow!("software surface of {}x{} is too large to address", size.width, size.height));
        };
        let images = (0..options.image_count)
            .map(|i| SwapchainImage {
                fbo: FramebufferId(i as u64),
                pixels: vec![0; len],
                presented_at: None,
            })
            .collect();

        log::debug!(
            "software surface {}x{} with {} images, extensions {:?}",
            size.width,
            size.height,
            options.image_count,
            options.extensions
        );

        Ok(Self {
            size,
            swapchain: Arc::new(Mutex::new(Swapchain {
                size,
                images,
                next_image: 0,
                presents: 0,
                front: None,
                damage: DamageTracker::new(options.damage_history, options.extensions),
                last_swap: None,
                last_repaint: None,
            })),
            next_frame_id: 0,
        })
    }

    /// How the most recent frame was swapped.
    pub fn last_swap(&self) -> Option<SwapStrategy> {
        self.swapchain.lock().ok()?.last_swap
    }

    /// Region the most recent frame actually rasterized.
    pub fn last_repaint(&self) -> Option<Rect> {
        self.swapchain.lock().ok()?.last_repaint
    }
}

impl SurfaceProvider for SoftwareSurface {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn acquire_frame(&mut self) -> Option<Box<dyn SurfaceFrame>> {
        if self.swapchain.is_poisoned() {
            log::error!("software swapchain lock poisoned");
            return None;
        }

        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;
        log::trace!("software frame {frame_id} acquired");

        Some(Box::new(SoftwareFrame {
            size: self.size,
            frame_id,
            swapchain: self.swapchain.clone(),
        }))
    }

    fn snapshot(&self) -> Option<RgbaImage> {
        let chain = self.swapchain.lock().ok()?;
        let image = &chain.images[chain.front?];
        Some(RgbaImage::from_raw(
            image.pixels.clone(),
            self.size.width,
            self.size.height,
            self.size.stride()?,
            PixelFormat::Rgba8,
        ))
    }
}

struct SoftwareFrame {
    size: SurfaceSize,
    frame_id: u64,
    swapchain: Arc<Mutex<Swapchain>>,
}

impl SurfaceFrame for SoftwareFrame {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn frame_id(&self) -> u64 {
        self.frame_id
    }

    fn present(self: Box<Self>, target: RenderTarget) -> Result<()> {
        let (list, frame_damage) = target.finish();

        let mut guard = self
            .swapchain
            .lock()
            .map_err(|_| anyhow!("software swapchain lock poisoned"))?;
        let chain = &mut *guard;
        if chain.size != self.size {
            return Err(anyhow!("frame {} outlived its swapchain configuration", self.frame_id));
        }

        let index = chain.next_image;
        chain.next_image = (index + 1) % chain.images.len();

        // Images that never made it to screen hold nothing worth keeping.
        let image_count = chain.images.len();
        let image = &mut chain.images[index];
        let buffer_age = match image.presented_at {
            None => 0,
            Some(at) => {
                let reported = u32::try_from(chain.presents - at + 1).unwrap_or(u32::MAX);
                chain.damage.effective_age(Some(reported), image_count)
            }
        };

        let full = chain.size.full_rect();
        let existing = chain.damage.existing_damage(image.fbo, buffer_age, full);
        let repaint = join_rects(join_rects(None, frame_damage), existing).unwrap_or(Rect::ZERO);

        if repaint.area() > 0.0 {
            let (width, height) = (chain.size.width as usize, chain.size.height as usize);
            Canvas::new(&mut image.pixels, width, height, repaint).draw_display_list(&list);
        }

        chain.damage.record_frame_damage(frame_damage);
        let swap = chain.damage.swap_strategy(frame_damage, full);

        chain.presents += 1;
        image.presented_at = Some(chain.presents);
        chain.front = Some(index);
        chain.last_swap = Some(swap);
        chain.last_repaint = Some(repaint);

        log::trace!(
            "software frame {}: image {index} at age {buffer_age}, {} ops, repainted {repaint:?}, swap {swap:?}",
            self.frame_id,
            list.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Color;
    use crate::interop::{Paint, ScopedObject};
    use crate::render::damage::DamageExtensions;

    const SIZE: SurfaceSize = SurfaceSize { width: 32, height: 32 };

    fn square_at(i: usize) -> Rect {
        let x = (i * 5 % 24) as f64;
        Rect::new(x, 4.0, x + 6.0, 10.0)
    }

    /// Draws the whole scene for step `i`, marking only what moved as damaged when `partial`.
    fn draw_step(surface: &mut SoftwareSurface, paint: &ScopedObject<Paint>, i: usize, partial: bool) {
        let frame = surface.acquire_frame().unwrap();
        let mut target = RenderTarget::new(frame.size(), frame.frame_id());
        target.encoder().clear(Color::BLACK);
        target.encoder().draw_rect(square_at(i), paint);
        if partial && i > 0 {
            target.set_damage(square_at(i - 1).union(square_at(i)));
        }
        frame.present(target).unwrap();
    }

    #[test]
    fn clear_shows_up_in_snapshot() {
        let ctx = SoftwareContext::new();
        let mut surface = ctx.create_surface(SIZE, SurfaceOptions::default()).unwrap();
        assert!(surface.snapshot().is_none());

        let frame = surface.acquire_frame().unwrap();
        let mut target = RenderTarget::new(frame.size(), frame.frame_id());
        target.encoder().clear(Color::new(0.0, 0.0, 1.0, 1.0));
        frame.present(target).unwrap();

        let image = surface.snapshot().unwrap();
        assert_eq!(image.pixel(0, 0), Some([0, 0, 255, 255]));
        assert_eq!(image.pixel(31, 31), Some([0, 0, 255, 255]));
    }

    #[test]
    fn partial_repaint_matches_full_render() {
        let paint = ScopedObject::create(Paint::new(Color::new(1.0, 0.5, 0.0, 1.0)));

        for image_count in [3, 6, 8] {
            for extensions in [DamageExtensions::all(), DamageExtensions::SWAP_BUFFERS_WITH_DAMAGE] {
                let options = SurfaceOptions { image_count, extensions, ..Default::default() };
                let mut partial = SoftwareSurface::new(SIZE, options).unwrap();
                for i in 0..12 {
                    draw_step(&mut partial, &paint, i, true);
                }

                let mut fresh = SoftwareSurface::new(SIZE, SurfaceOptions::default()).unwrap();
                draw_step(&mut fresh, &paint, 11, false);

                assert_eq!(
                    partial.snapshot().unwrap().pixels,
                    fresh.snapshot().unwrap().pixels,
                    "{image_count} images, extensions {extensions:?}"
                );
            }
        }
    }

    #[test]
    fn frames_acquired_together_still_repaint_correctly() {
        let paint = ScopedObject::create(Paint::new(Color::WHITE));

        for extensions in [DamageExtensions::all(), DamageExtensions::SWAP_BUFFERS_WITH_DAMAGE] {
            let options = SurfaceOptions { image_count: 6, extensions, ..Default::default() };
            let mut surface = SoftwareSurface::new(SIZE, options).unwrap();
            for i in 0..7 {
                draw_step(&mut surface, &paint, i, true);
            }

            // Two frames in flight at once, presented in acquisition order.
            let first = surface.acquire_frame().unwrap();
            let second = surface.acquire_frame().unwrap();
            for (frame, i) in [(first, 7), (second, 8)] {
                let mut target = RenderTarget::new(frame.size(), frame.frame_id());
                target.encoder().clear(Color::BLACK);
                target.encoder().draw_rect(square_at(i), &paint);
                target.set_damage(square_at(i - 1).union(square_at(i)));
                frame.present(target).unwrap();
            }

            let mut fresh = SoftwareSurface::new(SIZE, SurfaceOptions::default()).unwrap();
            draw_step(&mut fresh, &paint, 8, false);
            assert_eq!(
                surface.snapshot().unwrap().pixels,
                fresh.snapshot().unwrap().pixels,
                "extensions {extensions:?}"
            );
        }
    }

    #[test]
    fn steady_state_repaints_less_than_everything() {
        let paint = ScopedObject::create(Paint::new(Color::WHITE));
        let mut surface = SoftwareSurface::new(SIZE, SurfaceOptions::default()).unwrap();
        for i in 0..6 {
            draw_step(&mut surface, &paint, i, true);
        }

        let repaint = surface.last_repaint().unwrap();
        assert!(repaint.area() < SIZE.full_rect().area());
        assert_eq!(
            surface.last_swap(),
            Some(SwapStrategy::Partial(square_at(4).union(square_at(5))))
        );
    }

    #[test]
    fn without_damage_extensions_swaps_are_full() {
        let paint = ScopedObject::create(Paint::new(Color::WHITE));
        let options = SurfaceOptions { extensions: DamageExtensions::BUFFER_AGE, ..Default::default() };
        let mut surface = SoftwareSurface::new(SIZE, options).unwrap();
        draw_step(&mut surface, &paint, 0, true);
        draw_step(&mut surface, &paint, 1, true);
        assert_eq!(surface.last_swap(), Some(SwapStrategy::Full));
    }

    #[test]
    fn rejects_bad_configurations() {
        assert!(SoftwareSurface::new(SurfaceSize::new(0, 4), SurfaceOptions::default()).is_err());
        let options = SurfaceOptions { image_count: 0, ..Default::default() };
        assert!(SoftwareSurface::new(SIZE, options).is_err());
        let options = SurfaceOptions { image_count: MAX_SWAPCHAIN_IMAGES + 1, ..Default::default() };
        assert!(SoftwareSurface::new(SIZE, options).is_err());
    }

    #[test]
    fn unaddressable_sizes_are_refused() {
        let size = SurfaceSize::new(40000, 30000);
        let err = SoftwareSurface::new(size, SurfaceOptions::default()).err().unwrap();
        assert!(err.to_string().contains("too large"));
        assert!(SoftwareSurface::new(SurfaceSize::new(u32::MAX, 1), SurfaceOptions::default()).is_err());
    }
}
