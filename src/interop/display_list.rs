//! Display lists and their builder.
//!
//! A [`DisplayList`] is an immutable sequence of [`DisplayOp`] drawing commands. Ops hold strong
//! references to the paints, paths and textures they draw, so the list stays valid after the
//! caller releases its own handles.
//!
//! # Example
//!
//! ```rust
//! use impeller_toolkit::geometry::{Color, Rect};
//! use impeller_toolkit::interop::{DisplayListBuilder, Paint, ScopedObject};
//!
//! let paint = ScopedObject::create(Paint::new(Color::WHITE));
//!
//! let mut builder = DisplayListBuilder::new();
//! builder.clear(Color::BLACK);
//! builder.draw_rect(Rect::new(10.0, 20.0, 110.0, 70.0), &paint);
//!
//! let list = builder.build();
//! assert_eq!(list.get().unwrap().len(), 2);
//! ```

use crate::geometry::{join_rects, Color, Point, Rect};
use crate::interop::{DrawStyle, Paint, Path, ScopedObject, Texture};

/// A single drawing command.
#[derive(Clone, Debug)]
pub enum DisplayOp {
    /// Fill the entire target with the given color.
    Clear {
        color: Color,
    },

    /// Draw a rectangle with the given paint.
    DrawRect {
        rect: Rect,
        paint: ScopedObject<Paint>,
    },

    /// Draw a path with the given paint.
    DrawPath {
        path: ScopedObject<Path>,
        paint: ScopedObject<Paint>,
    },

    /// Draw a texture with its top-left corner at `origin`, modulated by the paint's alpha.
    DrawTexture {
        texture: ScopedObject<Texture>,
        origin: Point,
        paint: ScopedObject<Paint>,
    },
}

impl DisplayOp {
    /// Area the op may touch. `full` is the bounds of the target.
    pub fn bounds(&self, full: Rect) -> Rect {
        match self {
            DisplayOp::Clear { .. } => full,
            DisplayOp::DrawRect { rect, paint } => outset_for_stroke(*rect, paint),
            DisplayOp::DrawPath { path, paint } => {
                path.get().map_or(Rect::ZERO, |p| outset_for_stroke(p.bounds(), paint))
            }
            DisplayOp::DrawTexture { texture, origin, .. } => texture
                .get()
                .map_or(Rect::ZERO, |t| t.bounds().with_origin(*origin)),
        }
    }
}

fn outset_for_stroke(rect: Rect, paint: &ScopedObject<Paint>) -> Rect {
    match paint.get() {
        Some(p) if p.style() == DrawStyle::Stroke => {
            // Hairlines still cover half a pixel either side.
            let outset = (p.stroke_width() as f64 / 2.0).max(0.5);
            rect.inflate(outset, outset)
        }
        _ => rect,
    }
}

/// Immutable list of drawing commands.
#[derive(Clone, Debug, Default)]
pub struct DisplayList {
    ops: Vec<DisplayOp>,
}

impl DisplayList {
    pub fn ops(&self) -> &[DisplayOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Union of all op bounds clipped to `full`, or `None` when nothing is drawn.
    pub fn bounds(&self, full: Rect) -> Option<Rect> {
        self.ops
            .iter()
            .fold(None, |acc, op| join_rects(acc, op.bounds(full).intersect(full)))
    }
}

/// Records drawing commands. [`DisplayListBuilder::build`] hands out the list and resets.
#[derive(Clone, Debug, Default)]
pub struct DisplayListBuilder {
    ops: Vec<DisplayOp>,
}

impl DisplayListBuilder {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn clear(&mut self, color: Color) {
        self.ops.push(DisplayOp::Clear { color });
    }

    pub fn draw_rect(&mut self, rect: Rect, paint: &ScopedObject<Paint>) {
        self.ops.push(DisplayOp::DrawRect { rect, paint: paint.clone() });
    }

    pub fn draw_path(&mut self, path: &ScopedObject<Path>, paint: &ScopedObject<Paint>) {
        self.ops.push(DisplayOp::DrawPath { path: path.clone(), paint: paint.clone() });
    }

    pub fn draw_texture(&mut self, texture: &ScopedObject<Texture>, origin: Point, paint: &ScopedObject<Paint>) {
        self.ops.push(DisplayOp::DrawTexture {
            texture: texture.clone(),
            origin,
            paint: paint.clone(),
        });
    }

    /// Appends every op of an existing list.
    pub fn draw_display_list(&mut self, list: &DisplayList) {
        self.ops.extend(list.ops.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Takes the recorded ops as an immutable list without allocating a shared object.
    pub fn take(&mut self) -> DisplayList {
        DisplayList { ops: std::mem::take(&mut self.ops) }
    }

    /// Builds a shared display list and resets the builder.
    pub fn build(&mut self) -> ScopedObject<DisplayList> {
        ScopedObject::create(self.take())
    }
}
