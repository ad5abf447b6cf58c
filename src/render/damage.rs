//! Partial repaint bookkeeping.
//!
//! A swapchain image that comes back for reuse still holds whatever was drawn into it the last
//! time it was presented. Its *buffer age* says how many frames ago that was: age 1 means it holds
//! the previous frame, age 0 means its contents are undefined. To bring such an image up to date
//! only the regions that changed since then must be redrawn: the union of the last `age - 1`
//! frame damages, plus the damage of the frame being drawn.
//!
//! [`DamageTracker`] keeps the last few frame damages and answers that question per framebuffer.
//! When the surface cannot tell the compositor which region changed (neither damage extension is
//! present) the swap always covers the whole surface.

use crate::config::DEFAULT_DAMAGE_HISTORY;
use crate::geometry::{join_rects, Rect};
use bitflags::bitflags;
use std::collections::{HashMap, VecDeque};

bitflags! {
    /// Damage related extensions a surface supports.
    pub struct DamageExtensions: u32 {
        /// The surface can report the age of the image it hands out.
        const BUFFER_AGE = 0b001;
        /// The surface accepts a damage region before drawing.
        const SET_DAMAGE_REGION = 0b010;
        /// The surface can swap with a damage region.
        const SWAP_BUFFERS_WITH_DAMAGE = 0b100;
    }
}

/// Smallest age assumed when the surface cannot report one. Longer swapchains assume their length.
pub const ASSUMED_BUFFER_AGE: u32 = 4;

/// Identity of a framebuffer (swapchain image).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwapStrategy {
    /// Present the whole surface.
    Full,
    /// Present with only this region marked as changed.
    Partial(Rect),
}

#[derive(Debug)]
pub struct DamageTracker {
    extensions: DamageExtensions,
    history: VecDeque<Rect>,
    max_history: usize,
    existing: HashMap<FramebufferId, Rect>,
}

impl Default for DamageTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DAMAGE_HISTORY, DamageExtensions::all())
    }
}

impl DamageTracker {
    pub fn new(max_history: usize, extensions: DamageExtensions) -> Self {
        Self {
            extensions,
            history: VecDeque::with_capacity(max_history.max(1)),
            max_history: max_history.max(1),
            existing: HashMap::new(),
        }
    }

    pub fn extensions(&self) -> DamageExtensions {
        self.extensions
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// The age to use for an image of a swapchain with `image_count` images: the reported age when
    /// the surface supports buffer age, otherwise [`ASSUMED_BUFFER_AGE`] or the image count,
    /// whichever is larger.
    pub fn effective_age(&self, reported: Option<u32>, image_count: usize) -> u32 {
        if self.extensions.contains(DamageExtensions::BUFFER_AGE) {
            reported.unwrap_or(0)
        } else {
            let count = u32::try_from(image_count).unwrap_or(u32::MAX);
            ASSUMED_BUFFER_AGE.max(count)
        }
    }

    /// Region of framebuffer `fbo` that is stale given its buffer age. Age 0, or an age reaching
    /// further back than the recorded history, makes the whole surface stale.
    pub fn existing_damage(&mut self, fbo: FramebufferId, buffer_age: u32, full: Rect) -> Rect {
        let frames_behind = buffer_age.saturating_sub(1) as usize;
        let rect = if buffer_age == 0 || frames_behind > self.history.len() {
            full
        } else {
            self.history
                .iter()
                .rev()
                .take(frames_behind)
                .fold(None, |acc, r| join_rects(acc, *r))
                .unwrap_or(Rect::ZERO)
        };
        self.existing.insert(fbo, rect);
        rect
    }

    /// The existing damage last computed for `fbo`.
    pub fn cached_existing_damage(&self, fbo: FramebufferId) -> Option<Rect> {
        self.existing.get(&fbo).copied()
    }

    /// Forget a framebuffer, e.g. when its swapchain is recreated.
    pub fn forget(&mut self, fbo: FramebufferId) {
        self.existing.remove(&fbo);
    }

    /// Records the damage of a presented frame, dropping the oldest entry past the history limit.
    pub fn record_frame_damage(&mut self, damage: Rect) {
        self.history.push_back(damage);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    /// How to swap a frame that changed `frame_damage`.
    pub fn swap_strategy(&self, frame_damage: Rect, full: Rect) -> SwapStrategy {
        let partial = DamageExtensions::SET_DAMAGE_REGION | DamageExtensions::SWAP_BUFFERS_WITH_DAMAGE;
        if self.extensions.intersects(partial) {
            SwapStrategy::Partial(frame_damage.intersect(full))
        } else {
            SwapStrategy::Full
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: Rect = Rect::new(0.0, 0.0, 100.0, 100.0);
    const FBO: FramebufferId = FramebufferId(1);

    fn r(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect {
        Rect::new(x0, y0, x1, y1)
    }

    #[test]
    fn age_zero_is_full_damage() {
        let mut tracker = DamageTracker::default();
        tracker.record_frame_damage(r(0.0, 0.0, 1.0, 1.0));
        assert_eq!(tracker.existing_damage(FBO, 0, FULL), FULL);
    }

    #[test]
    fn age_one_needs_nothing_extra() {
        let mut tracker = DamageTracker::default();
        tracker.record_frame_damage(r(0.0, 0.0, 1.0, 1.0));
        assert_eq!(tracker.existing_damage(FBO, 1, FULL), Rect::ZERO);
    }

    #[test]
    fn joins_damage_since_buffer_was_last_used() {
        let mut tracker = DamageTracker::default();
        tracker.record_frame_damage(r(50.0, 50.0, 60.0, 60.0));
        tracker.record_frame_damage(r(0.0, 0.0, 10.0, 10.0));
        tracker.record_frame_damage(r(20.0, 20.0, 30.0, 30.0));

        // Age 3: the image misses the last two frames.
        assert_eq!(tracker.existing_damage(FBO, 3, FULL), r(0.0, 0.0, 30.0, 30.0));
        assert_eq!(tracker.cached_existing_damage(FBO), Some(r(0.0, 0.0, 30.0, 30.0)));

        tracker.forget(FBO);
        assert_eq!(tracker.cached_existing_damage(FBO), None);
    }

    #[test]
    fn age_beyond_history_is_full_damage() {
        let mut tracker = DamageTracker::new(2, DamageExtensions::all());
        for _ in 0..5 {
            tracker.record_frame_damage(r(0.0, 0.0, 1.0, 1.0));
        }
        assert_eq!(tracker.history_len(), 2);
        assert_eq!(tracker.existing_damage(FBO, 3, FULL), r(0.0, 0.0, 1.0, 1.0));
        assert_eq!(tracker.existing_damage(FBO, 4, FULL), FULL);
    }

    #[test]
    fn missing_buffer_age_assumes_at_least_the_swapchain_length() {
        let tracker = DamageTracker::new(10, DamageExtensions::SET_DAMAGE_REGION);
        assert_eq!(tracker.effective_age(Some(1), 3), ASSUMED_BUFFER_AGE);
        assert_eq!(tracker.effective_age(Some(1), 6), 6);

        let tracker = DamageTracker::default();
        assert_eq!(tracker.effective_age(Some(2), 6), 2);
        assert_eq!(tracker.effective_age(None, 3), 0);
    }

    #[test]
    fn without_damage_extensions_swap_is_full() {
        let damage = r(10.0, 10.0, 20.0, 20.0);
        let tracker = DamageTracker::new(10, DamageExtensions::BUFFER_AGE);
        assert_eq!(tracker.swap_strategy(damage, FULL), SwapStrategy::Full);

        let tracker = DamageTracker::new(10, DamageExtensions::SWAP_BUFFERS_WITH_DAMAGE);
        assert_eq!(tracker.swap_strategy(damage, FULL), SwapStrategy::Partial(damage));
    }
}
