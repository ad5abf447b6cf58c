use crate::geometry::{Rect, SurfaceSize};
use crate::interop::{DisplayList, DisplayListBuilder};

/// What a frame callback draws into.
///
/// Commands are recorded into the target's [`DisplayListBuilder`] and handed to the backend when
/// the frame is presented. The damage rectangle defaults to the bounds of what was recorded.
#[derive(Debug)]
pub struct RenderTarget {
    size: SurfaceSize,
    frame_id: u64,
    encoder: DisplayListBuilder,
    damage: Option<Rect>,
}

impl RenderTarget {
    pub fn new(size: SurfaceSize, frame_id: u64) -> Self {
        Self {
            size,
            frame_id,
            encoder: DisplayListBuilder::new(),
            damage: None,
        }
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn encoder(&mut self) -> &mut DisplayListBuilder {
        &mut self.encoder
    }

    /// Overrides the damage computed from the recorded commands.
    pub fn set_damage(&mut self, rect: Rect) {
        self.damage = Some(rect);
    }

    /// Splits the target into the recorded list and the damage this frame introduces, clipped to
    /// the target.
    pub fn finish(mut self) -> (DisplayList, Rect) {
        let full = self.size.full_rect();
        let list = self.encoder.take();
        let damage = match self.damage {
            Some(rect) => rect.intersect(full),
            None => list.bounds(full).unwrap_or(Rect::ZERO),
        };
        (list, damage)
    }
}
