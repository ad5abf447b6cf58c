use crate::geometry::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawStyle {
    #[default]
    Fill,
    Stroke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Composite over what is already there.
    #[default]
    SourceOver,
    /// Replace the destination.
    Source,
}

/// How a shape is painted. Immutable once shared; use the setters before handing it out.
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    color: Color,
    style: DrawStyle,
    stroke_width: f32,
    blend_mode: BlendMode,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            style: DrawStyle::Fill,
            stroke_width: 1.0,
            blend_mode: BlendMode::SourceOver,
        }
    }
}

impl Paint {
    pub fn new(color: Color) -> Self {
        Self { color, ..Default::default() }
    }

    pub fn color(&self) -> Color { self.color }
    pub fn style(&self) -> DrawStyle { self.style }
    pub fn stroke_width(&self) -> f32 { self.stroke_width }
    pub fn blend_mode(&self) -> BlendMode { self.blend_mode }

    pub fn set_color(&mut self, color: Color) { self.color = color; }
    pub fn set_style(&mut self, style: DrawStyle) { self.style = style; }
    pub fn set_blend_mode(&mut self, mode: BlendMode) { self.blend_mode = mode; }

    /// Negative widths are clamped to zero (hairline).
    pub fn set_stroke_width(&mut self, width: f32) {
        self.stroke_width = width.max(0.0);
    }
}
