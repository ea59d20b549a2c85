//! Selection auto-scroll pacing.
//!
//! While a drag is outside the grid, a repeating timer extends the
//! selection and scrolls the viewport. The period shrinks as the pointer
//! moves further away, so a small overshoot crawls and a long pull flies.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Auto-scroll state while a selection drag is outside the grid.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoScroll {
    active: Option<(ScrollDirection, u32)>,
}

const BASE_PERIOD: Duration = Duration::from_millis(400);
const MIN_PERIOD: Duration = Duration::from_millis(10);

impl AutoScroll {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer moved outside the grid: `distance` pixels past the edge.
    pub fn update(&mut self, direction: ScrollDirection, distance: u32) {
        self.active = Some((direction, distance.max(1)));
    }

    /// Pointer re-entered the grid or the button was released.
    pub fn stop(&mut self) {
        self.active = None;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    #[must_use]
    pub fn direction(&self) -> Option<ScrollDirection> {
        self.active.map(|(d, _)| d)
    }

    /// Timer period: inversely proportional to the pointer distance.
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        let (_, distance) = self.active?;
        Some((BASE_PERIOD / distance).max(MIN_PERIOD))
    }
}
