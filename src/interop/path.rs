//! Immutable paths and the builder that produces them.

use crate::geometry::{Point, Rect};
use kurbo::{BezPath, PathEl, Shape};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillType {
    #[default]
    NonZero,
    EvenOdd,
}

/// An immutable path, shareable between display lists.
#[derive(Debug, Clone)]
pub struct Path {
    path: BezPath,
    fill_type: FillType,
    bounds: Rect,
}

impl Path {
    fn new(path: BezPath, fill_type: FillType) -> Self {
        let bounds = if path.elements().is_empty() { Rect::ZERO } else { path.bounding_box() };
        Self { path, fill_type, bounds }
    }

    pub fn fill_type(&self) -> FillType {
        self.fill_type
    }

    /// Tight bounds of the path. Empty paths have zero bounds.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn elements(&self) -> &[PathEl] {
        self.path.elements()
    }

    pub fn is_empty(&self) -> bool {
        self.path.elements().is_empty()
    }

    /// Flattens the path into polylines, one per subpath, within `tolerance` pixels.
    pub fn flatten(&self, tolerance: f64) -> Vec<Contour> {
        let mut contours: Vec<Contour> = Vec::new();
        let mut current: Vec<Point> = Vec::new();

        let mut finish = |points: &mut Vec<Point>, closed: bool| {
            if points.len() > 1 {
                contours.push(Contour { points: std::mem::take(points), closed });
            }
            points.clear();
        };

        self.path.flatten(tolerance, |el| match el {
            PathEl::MoveTo(p) => {
                finish(&mut current, false);
                current.push(p);
            }
            PathEl::LineTo(p) => current.push(p),
            PathEl::ClosePath => finish(&mut current, true),
            // flatten() only emits lines
            PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
        });
        finish(&mut current, false);
        contours
    }
}

/// A flattened subpath.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point>,
    /// Whether the subpath was explicitly closed. Fills always treat contours as closed.
    pub closed: bool,
}

impl Contour {
    /// Line segments of the contour, including the closing one when `closed`.
    pub fn segments(&self, closed: bool) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        let count = if closed { n } else { n.saturating_sub(1) };
        (0..count).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }
}

/// Accumulates path segments. [`PathBuilder::take_path`] hands out the result and resets the
/// builder so it can be reused.
#[derive(Debug, Default, Clone)]
pub struct PathBuilder {
    path: BezPath,
    has_current_point: bool,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, p: Point) -> &mut Self {
        self.path.move_to(p);
        self.has_current_point = true;
        self
    }

    /// Starts a subpath at the origin if there is no current point, like most canvas APIs do.
    fn ensure_current_point(&mut self) {
        if !self.has_current_point {
            self.move_to(Point::ORIGIN);
        }
    }

    pub fn line_to(&mut self, p: Point) -> &mut Self {
        self.ensure_current_point();
        self.path.line_to(p);
        self
    }

    pub fn quadratic_curve_to(&mut self, control: Point, end: Point) -> &mut Self {
        self.ensure_current_point();
        self.path.quad_to(control, end);
        self
    }

    pub fn cubic_curve_to(&mut self, c1: Point, c2: Point, end: Point) -> &mut Self {
        self.ensure_current_point();
        self.path.curve_to(c1, c2, end);
        self
    }

    pub fn add_rect(&mut self, rect: Rect) -> &mut Self {
        self.path.move_to((rect.x0, rect.y0));
        self.path.line_to((rect.x1, rect.y0));
        self.path.line_to((rect.x1, rect.y1));
        self.path.line_to((rect.x0, rect.y1));
        self.path.close_path();
        self.has_current_point = false;
        self
    }

    pub fn close(&mut self) -> &mut Self {
        if self.has_current_point {
            self.path.close_path();
            self.has_current_point = false;
        }
        self
    }

    /// Builds the path and resets the builder.
    pub fn take_path(&mut self, fill_type: FillType) -> Path {
        self.has_current_point = false;
        Path::new(std::mem::take(&mut self.path), fill_type)
    }
}
