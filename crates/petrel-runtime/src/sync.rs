//! Synchronized-update watchdog.
//!
//! Between BSU and ESU the renderer must not present. An application that
//! never sends ESU would freeze the display forever, so a watchdog
//! force-ends the window after [`SYNC_UPDATE_TIMEOUT`]. The clock is
//! passed in, keeping this testable without sleeping.

use std::time::{Duration, Instant};

/// How long a synchronized-update window may stay open.
pub const SYNC_UPDATE_TIMEOUT: Duration = Duration::from_millis(150);

/// Deadline tracker for the synchronized-update window.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncUpdateWatchdog {
    deadline: Option<Instant>,
}

impl SyncUpdateWatchdog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// BSU: arm (or re-arm) the deadline.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + SYNC_UPDATE_TIMEOUT);
    }

    /// ESU arrived in time.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// The next instant the host loop must wake up for, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Poll: true exactly once when the deadline has passed, disarming.
    /// The caller must then force-end the synchronized update.
    pub fn expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
