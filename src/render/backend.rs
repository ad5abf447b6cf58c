use crate::geometry::SurfaceSize;
use crate::render::damage::DamageExtensions;
use crate::render::RenderTarget;
use serde::{Deserialize, Serialize};
use std::io::Write;
use uuid::Uuid;

/// Backends a context or playground can be set up for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    Metal,
    Vulkan,
    OpenGLES,
    /// CPU rasterizer, always available.
    Software,
    /// Presents nothing. Useful for driving the render loop without pixels.
    Null,
}

impl BackendKind {
    /// GPU backends need native implementations this crate does not ship.
    pub fn is_gpu(&self) -> bool {
        matches!(self, BackendKind::Metal | BackendKind::Vulkan | BackendKind::OpenGLES)
    }
}

/// Identity of a backend context.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Straight (non premultiplied) RGBA, 8 bits per channel.
    Rgba8,
}

/// Small RGBA snapshot of a presented surface.
#[derive(Clone)]
pub struct RgbaImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
}

impl RgbaImage {
    pub fn from_raw(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
    ) -> Self {
        assert!(
            pixels.len() >= (height as usize) * (stride as usize),
            "pixel buffer too small for image dimensions"
        );

        Self {
            pixels,
            width,
            height,
            stride,
            format,
        }
    }

    /// Pixel at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.stride as usize + x as usize * 4;
        let px = self.pixels.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Encodes the image as PNG into `out`.
    pub fn write_png<W: Write>(&self, out: W) -> anyhow::Result<()> {
        let (height, stride) = (self.height as usize, self.stride as usize);
        let row_len = self.width as usize * 4;
        if stride < row_len {
            return Err(anyhow::anyhow!(
                "stride {stride} is smaller than a {}-pixel row",
                self.width
            ));
        }
        // The last row only needs its pixels, not the padding after them.
        let needed = height.checked_sub(1).map_or(0, |rows| rows * stride + row_len);
        if self.pixels.len() < needed {
            return Err(anyhow::anyhow!(
                "{} bytes cannot hold a {}x{} image with stride {stride}",
                self.pixels.len(),
                self.width,
                self.height
            ));
        }

        let mut encoder = png::Encoder::new(out, self.width, self.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;

        let mut data = Vec::with_capacity(row_len * height);
        for y in 0..height {
            let start = y * stride;
            data.extend_from_slice(&self.pixels[start..start + row_len]);
        }
        writer.write_image_data(&data)?;
        writer.finish()?;
        Ok(())
    }
}

impl std::fmt::Debug for RgbaImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbaImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.pixels.len())
            .finish()
    }
}

/// How a surface should be set up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceOptions {
    /// Number of images the surface rotates through.
    pub image_count: usize,
    /// Number of frame damages kept for partial repaint.
    pub damage_history: usize,
    /// Damage extensions the surface may use.
    pub extensions: DamageExtensions,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            image_count: 3,
            damage_history: crate::config::DEFAULT_DAMAGE_HISTORY,
            extensions: DamageExtensions::all(),
        }
    }
}

impl From<&crate::config::PlaygroundConfig> for SurfaceOptions {
    fn from(config: &crate::config::PlaygroundConfig) -> Self {
        Self {
            image_count: config.swapchain_image_count,
            damage_history: config.damage_history,
            ..Default::default()
        }
    }
}

/// A backend context. Shared by every surface and renderer created from it, across threads;
/// backends synchronize their own internal resources.
pub trait RenderContext: Send + Sync {
    /// Short human readable name, used in logs.
    fn name(&self) -> &str;

    fn backend(&self) -> BackendKind;

    fn id(&self) -> ContextId;

    /// Whether setup succeeded. Invalid contexts make every renderer built on them a no-op.
    fn is_valid(&self) -> bool;

    /// Create a new surface of the given size.
    fn create_surface(&self, size: SurfaceSize, options: SurfaceOptions) -> anyhow::Result<Box<dyn SurfaceProvider>>;
}

/// Something that hands out one presentable frame at a time (a swapchain, an offscreen target).
pub trait SurfaceProvider: Send {
    fn size(&self) -> SurfaceSize;

    /// Acquire the next frame. `None` when no frame can be produced right now.
    fn acquire_frame(&mut self) -> Option<Box<dyn SurfaceFrame>>;

    /// Pixels of the most recently presented frame, if the backend can read them back.
    fn snapshot(&self) -> Option<RgbaImage>;
}

/// A single-use presentable frame.
pub trait SurfaceFrame: Send {
    fn size(&self) -> SurfaceSize;

    fn frame_id(&self) -> u64;

    /// Submit what was encoded into `target` and present the frame.
    fn present(self: Box<Self>, target: RenderTarget) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_output_has_signature() {
        let image = RgbaImage::from_raw(vec![255; 2 * 2 * 4], 2, 2, 8, PixelFormat::Rgba8);
        let mut out = Vec::new();
        image.write_png(&mut out).unwrap();
        assert_eq!(&out[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn png_output_checks_the_row_layout() {
        // Stride shorter than a row.
        let image = RgbaImage::from_raw(vec![0; 8], 2, 2, 4, PixelFormat::Rgba8);
        assert!(image.write_png(Vec::new()).is_err());

        let mut image = RgbaImage::from_raw(vec![0; 16], 2, 2, 8, PixelFormat::Rgba8);
        image.pixels.truncate(12);
        assert!(image.write_png(Vec::new()).is_err());

        let image = RgbaImage { stride: 0, ..image };
        assert!(image.write_png(Vec::new()).is_err());
    }

    #[test]
    fn pixel_lookup_respects_bounds() {
        let mut pixels = vec![0; 8];
        pixels[4..8].copy_from_slice(&[1, 2, 3, 4]);
        let image = RgbaImage::from_raw(pixels, 2, 1, 8, PixelFormat::Rgba8);
        assert_eq!(image.pixel(1, 0), Some([1, 2, 3, 4]));
        assert_eq!(image.pixel(2, 0), None);
    }

    #[test]
    fn gpu_kinds() {
        assert!(BackendKind::Vulkan.is_gpu());
        assert!(!BackendKind::Software.is_gpu());
    }
}
