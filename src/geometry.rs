//! Small geometry and color types shared by the interop objects and the backends.
//!
//! Rectangles and points come from `kurbo`; [`Color`] and [`SurfaceSize`] are our own.

pub use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// RGBA color used for drawing commands.
///
/// Channels are represented as `f32` in the range `0.0 ..= 1.0`, not premultiplied.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
    /// Alpha channel (opacity)
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    /// Creates a new color from `f32` channel values in the range `0.0 ..= 1.0`.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Color {
        Color { r, g, b, a }
    }

    /// Creates a new color from `u8` channel values in the range `0 ..= 255`.
    pub fn from_u8(r: u8, g: u8, b: u8, a: u8) -> Color {
        Color {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Returns the color as RGBA8, clamping out of range channels.
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

/// Size of a surface in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Bytes per row of a tightly packed RGBA8 image, or `None` if that does not fit a `u32`.
    pub fn stride(&self) -> Option<u32> {
        self.width.checked_mul(4)
    }

    /// Bytes in a tightly packed RGBA8 image of this size, or `None` if the stride or the total
    /// does not fit a `u32`.
    pub fn byte_len(&self) -> Option<usize> {
        let len = (self.stride()? as usize).checked_mul(self.height as usize)?;
        u32::try_from(len).ok()?;
        Some(len)
    }

    /// The rectangle covering the whole surface.
    pub fn full_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f64, self.height as f64)
    }
}

/// Union of an optional rectangle with another. `None` stands for "nothing yet".
pub fn join_rects(acc: Option<Rect>, rect: Rect) -> Option<Rect> {
    if rect.area() <= 0.0 {
        return acc;
    }
    Some(match acc {
        Some(acc) => acc.union(rect),
        None => rect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba8_conversion_clamps() {
        assert_eq!(Color::new(1.5, -1.0, 0.5, 1.0).to_rgba8(), [255, 0, 128, 255]);
        assert_eq!(Color::from_u8(10, 20, 30, 40).to_rgba8(), [10, 20, 30, 40]);
    }

    #[test]
    fn byte_len_rejects_sizes_that_overflow() {
        assert_eq!(SurfaceSize::new(4, 2).byte_len(), Some(32));
        assert_eq!(SurfaceSize::new(4, 2).stride(), Some(16));
        assert_eq!(SurfaceSize::new(u32::MAX, 1).stride(), None);
        assert_eq!(SurfaceSize::new(40000, 30000).byte_len(), None);
        assert_eq!(SurfaceSize::new(u32::MAX / 4, 1).byte_len(), Some((u32::MAX / 4) as usize * 4));
    }

    #[test]
    fn join_ignores_empty_rects() {
        let r = Rect::new(1.0, 1.0, 4.0, 4.0);
        assert_eq!(join_rects(None, Rect::ZERO), None);
        assert_eq!(join_rects(Some(r), Rect::ZERO), Some(r));
        assert_eq!(
            join_rects(Some(r), Rect::new(10.0, 0.0, 12.0, 2.0)),
            Some(Rect::new(1.0, 0.0, 12.0, 4.0))
        );
    }
}
