//! Scanline rasterizer used by the software backend.
//!
//! Coverage is point sampled at pixel centers (no anti-aliasing). Colors are straight alpha RGBA8.

use crate::geometry::{Color, Point, Rect};
use crate::interop::{BlendMode, Contour, DisplayList, DisplayOp, DrawStyle, FillType, Paint, Path, Texture};
use std::ops::Range;

const FLATTEN_TOLERANCE: f64 = 0.25;

/// Pixel indices whose centers fall inside `[lo, hi)`, limited to `0..max`.
fn center_span(lo: f64, hi: f64, max: usize) -> Range<usize> {
    let start = (lo - 0.5).ceil().clamp(0.0, max as f64) as usize;
    let end = (hi - 0.5).ceil().clamp(0.0, max as f64) as usize;
    start..end.max(start)
}

/// Pixel indices touched at all by `[lo, hi)`, limited to `0..max`.
fn outer_span(lo: f64, hi: f64, max: usize) -> Range<usize> {
    let start = lo.floor().clamp(0.0, max as f64) as usize;
    let end = hi.ceil().clamp(0.0, max as f64) as usize;
    start..end.max(start)
}

fn intersect(a: &Range<usize>, b: &Range<usize>) -> Range<usize> {
    let start = a.start.max(b.start);
    start..a.end.min(b.end).max(start)
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let d = b - a;
    let len2 = d.hypot2();
    if len2 == 0.0 {
        return (p - a).hypot();
    }
    let t = ((p - a).dot(d) / len2).clamp(0.0, 1.0);
    (p - (a + d * t)).hypot()
}

pub(crate) struct Canvas<'a> {
    pixels: &'a mut [u8],
    width: usize,
    clip_x: Range<usize>,
    clip_y: Range<usize>,
}

impl<'a> Canvas<'a> {
    /// A canvas over tightly packed RGBA8 `pixels` that only touches pixels overlapping `clip`.
    pub(crate) fn new(pixels: &'a mut [u8], width: usize, height: usize, clip: Rect) -> Self {
        debug_assert_eq!(pixels.len(), width * height * 4);
        let clip = clip.abs();
        Self {
            pixels,
            width,
            clip_x: outer_span(clip.x0, clip.x1, width),
            clip_y: outer_span(clip.y0, clip.y1, height),
        }
    }

    pub(crate) fn draw_display_list(&mut self, list: &DisplayList) {
        for op in list.ops() {
            match op {
                DisplayOp::Clear { color } => self.clear(*color),
                DisplayOp::DrawRect { rect, paint } => {
                    if let Some(paint) = paint.get() {
                        self.draw_rect(*rect, paint);
                    }
                }
                DisplayOp::DrawPath { path, paint } => {
                    if let (Some(path), Some(paint)) = (path.get(), paint.get()) {
                        self.draw_path(path, paint);
                    }
                }
                DisplayOp::DrawTexture { texture, origin, paint } => {
                    if let (Some(texture), Some(paint)) = (texture.get(), paint.get()) {
                        self.draw_texture(texture, *origin, paint);
                    }
                }
            }
        }
    }

    fn clear(&mut self, color: Color) {
        let src = [color.r, color.g, color.b, color.a];
        for y in self.clip_y.clone() {
            for x in self.clip_x.clone() {
                self.blend(x, y, src, BlendMode::Source);
            }
        }
    }

    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        let rect = rect.abs();
        match paint.style() {
            DrawStyle::Fill => self.fill_region(rect, paint, |_| true),
            DrawStyle::Stroke => {
                let hw = (paint.stroke_width() as f64 / 2.0).max(0.5);
                let inner = rect.inflate(-hw, -hw);
                let hollow = inner.width() > 0.0 && inner.height() > 0.0;
                self.fill_region(rect.inflate(hw, hw), paint, |p| !(hollow && inner.contains(p)));
            }
        }
    }

    /// Blends the paint color into every pixel center inside `area` accepted by `inside`.
    fn fill_region(&mut self, area: Rect, paint: &Paint, inside: impl Fn(Point) -> bool) {
        let c = paint.color();
        let src = [c.r, c.g, c.b, c.a];
        let height = self.pixels.len() / 4 / self.width.max(1);
        let xs = intersect(&center_span(area.x0, area.x1, self.width), &self.clip_x);
        let ys = intersect(&center_span(area.y0, area.y1, height), &self.clip_y);
        for y in ys {
            for x in xs.clone() {
                if inside(Point::new(x as f64 + 0.5, y as f64 + 0.5)) {
                    self.blend(x, y, src, paint.blend_mode());
                }
            }
        }
    }

    fn draw_path(&mut self, path: &Path, paint: &Paint) {
        let contours = path.flatten(FLATTEN_TOLERANCE);
        match paint.style() {
            DrawStyle::Fill => self.fill_contours(path, &contours, paint),
            DrawStyle::Stroke => {
                let hw = (paint.stroke_width() as f64 / 2.0).max(0.5);
                let segments: Vec<(Point, Point)> = contours
                    .iter()
                    .flat_map(|c| c.segments(c.closed))
                    .collect();
                self.fill_region(path.bounds().inflate(hw, hw), paint, |p| {
                    segments.iter().any(|&(a, b)| distance_to_segment(p, a, b) <= hw)
                });
            }
        }
    }

    fn fill_contours(&mut self, path: &Path, contours: &[Contour], paint: &Paint) {
        let c = paint.color();
        let src = [c.r, c.g, c.b, c.a];
        let bounds = path.bounds();
        let height = self.pixels.len() / 4 / self.width.max(1);
        let ys = intersect(&center_span(bounds.y0, bounds.y1, height), &self.clip_y);

        let mut crossings: Vec<(f64, i32)> = Vec::new();
        for y in ys {
            let yc = y as f64 + 0.5;
            crossings.clear();
            for (a, b) in contours.iter().flat_map(|c| c.segments(true)) {
                let dir = if a.y <= yc && b.y > yc {
                    1
                } else if b.y <= yc && a.y > yc {
                    -1
                } else {
                    continue;
                };
                let x = a.x + (yc - a.y) / (b.y - a.y) * (b.x - a.x);
                crossings.push((x, dir));
            }
            crossings.sort_by(|l, r| l.0.total_cmp(&r.0));

            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                let inside = match path.fill_type() {
                    FillType::NonZero => winding != 0,
                    FillType::EvenOdd => winding % 2 != 0,
                };
                if !inside {
                    continue;
                }
                let xs = intersect(&center_span(pair[0].0, pair[1].0, self.width), &self.clip_x);
                for x in xs {
                    self.blend(x, y, src, paint.blend_mode());
                }
            }
        }
    }

    fn draw_texture(&mut self, texture: &Texture, origin: Point, paint: &Paint) {
        let dest = texture.bounds().with_origin(origin);
        let height = self.pixels.len() / 4 / self.width.max(1);
        let xs = intersect(&center_span(dest.x0, dest.x1, self.width), &self.clip_x);
        let ys = intersect(&center_span(dest.y0, dest.y1, height), &self.clip_y);
        let alpha = paint.color().a;

        for y in ys {
            let ty = (y as f64 + 0.5 - origin.y).floor() as i64;
            for x in xs.clone() {
                let tx = (x as f64 + 0.5 - origin.x).floor() as i64;
                let t = texture.texel(tx, ty);
                let src = [
                    t[0] as f32 / 255.0,
                    t[1] as f32 / 255.0,
                    t[2] as f32 / 255.0,
                    t[3] as f32 / 255.0 * alpha,
                ];
                self.blend(x, y, src, paint.blend_mode());
            }
        }
    }

    fn blend(&mut self, x: usize, y: usize, src: [f32; 4], mode: BlendMode) {
        let idx = (y * self.width + x) * 4;
        let dst = &mut self.pixels[idx..idx + 4];

        let out = match mode {
            BlendMode::Source => src,
            BlendMode::SourceOver => {
                let sa = src[3].clamp(0.0, 1.0);
                let da = dst[3] as f32 / 255.0;
                let oa = sa + da * (1.0 - sa);
                if oa <= 0.0 {
                    [0.0; 4]
                } else {
                    let mut out = [0.0, 0.0, 0.0, oa];
                    for i in 0..3 {
                        let dc = dst[i] as f32 / 255.0;
                        out[i] = (src[i] * sa + dc * da * (1.0 - sa)) / oa;
                    }
                    out
                }
            }
        };

        let rgba = Color::new(out[0], out[1], out[2], out[3]).to_rgba8();
        dst.copy_from_slice(&rgba);
    }
}
