//! Scroll-driven class toggling.
//!
//! Header and back-to-top button are active whenever the page is scrolled.
//! Motion items reveal once they come close enough to the viewport and then
//! stay revealed.

use std::time::Duration;

/// Class of elements revealed on scroll.
pub const MOTION_ITEM_CLASS: &str = "js-motion-item";
/// Class added to a revealed motion item.
pub const MOTION_ACTIVE_CLASS: &str = "is-motion-active";
/// Class of the back-to-top button.
pub const BACK_TO_TOP_CLASS: &str = "js-btn-top";
/// Viewports wider than this reveal motion items earlier.
pub const WIDE_VIEWPORT: f64 = 640.0;
/// Length of the back-to-top animation.
pub const BACK_TO_TOP_DURATION: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Header and back-to-top are active iff the page is scrolled at all.
pub fn header_active(scroll_top: f64) -> bool {
    scroll_top > 0.0
}

/// Whether an item at `offset_top` should be revealed.
pub fn motion_reached(scroll_top: f64, offset_top: f64, viewport: Viewport) -> bool {
    scroll_top > offset_top - viewport.height / 2.0
        || (viewport.width > WIDE_VIEWPORT && scroll_top > offset_top - viewport.height / 1.5)
}

/// A revealable element. Once active it never deactivates.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionItem {
    pub offset_top: f64,
    active: bool,
}

impl MotionItem {
    pub fn new(offset_top: f64) -> Self {
        Self { offset_top, active: false }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Update for a scroll position; returns true if the item just activated.
    pub fn update(&mut self, scroll_top: f64, viewport: Viewport) -> bool {
        if self.active || !motion_reached(scroll_top, self.offset_top, viewport) {
            return false;
        }
        self.active = true;
        true
    }
}

/// Class changes produced by one scroll event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScrollEffects {
    pub header_active: bool,
    /// Indices of motion items revealed by this event
    pub revealed: Vec<usize>,
}

/// Scroll state of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollTracker {
    viewport: Viewport,
    items: Vec<MotionItem>,
}

impl ScrollTracker {
    /// Track items at the given offsets. The viewport is measured once at load.
    pub fn new(viewport: Viewport, offsets: &[f64]) -> Self {
        Self { viewport, items: offsets.iter().map(|o| MotionItem::new(*o)).collect() }
    }

    pub fn items(&self) -> &[MotionItem] {
        &self.items
    }

    pub fn on_scroll(&mut self, scroll_top: f64) -> ScrollEffects {
        let viewport = self.viewport;
        let revealed = self
            .items
            .iter_mut()
            .enumerate()
            .filter_map(|(i, item)| item.update(scroll_top, viewport).then_some(i))
            .collect();
        ScrollEffects { header_active: header_active(scroll_top), revealed }
    }
}

/// Scroll position of the back-to-top animation `elapsed` after it started
/// from `start`. Eases out and lands on 0 after [`BACK_TO_TOP_DURATION`].
pub fn back_to_top_position(start: f64, elapsed: Duration) -> f64 {
    let t = (elapsed.as_secs_f64() / BACK_TO_TOP_DURATION.as_secs_f64()).clamp(0.0, 1.0);
    let eased = 1.0 - (1.0 - t) * (1.0 - t);
    start * (1.0 - eased)
}
