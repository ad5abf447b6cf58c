use crate::errors::InteropError;
use crate::geometry::{Rect, SurfaceSize};

/// RGBA8 (straight alpha) image contents that display lists can draw.
#[derive(Clone)]
pub struct Texture {
    size: SurfaceSize,
    pixels: Vec<u8>,
}

impl Texture {
    /// Creates a texture from tightly packed RGBA8 rows.
    pub fn with_contents(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, InteropError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(InteropError::InvalidTextureContents { width, height, len: pixels.len() });
        }
        Ok(Self { size: SurfaceSize { width, height }, pixels })
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn bounds(&self) -> Rect {
        self.size.full_rect()
    }

    /// Texel at `(x, y)`, clamped to the edges.
    pub fn texel(&self, x: i64, y: i64) -> [u8; 4] {
        let x = x.clamp(0, self.size.width as i64 - 1) as usize;
        let y = y.clamp(0, self.size.height as i64 - 1) as usize;
        let idx = (y * self.size.width as usize + x) * 4;
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2], self.pixels[idx + 3]]
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.size.width)
            .field("height", &self.size.height)
            .field("len", &self.pixels.len())
            .finish()
    }
}
