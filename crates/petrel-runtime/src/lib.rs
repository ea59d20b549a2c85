//! Host runtime pieces around the terminal core.
//!
//! The core runs on a single-threaded cooperative event loop; the loop
//! itself (epoll/poll, signalfd, timerfd) belongs to the host and is
//! reached only through the contracts in [`fdm`] and [`reaper`]. What does
//! live here is the machinery with real logic in it: the render worker
//! pool, the synchronized-update watchdog, and the selection auto-scroll
//! pacing policy.

pub mod autoscroll;
pub mod fdm;
pub mod reaper;
pub mod sync;
pub mod workers;

pub use autoscroll::{AutoScroll, ScrollDirection};
pub use fdm::{EventHandler, Interest, Multiplexer};
pub use reaper::{ExitCallback, Reaper};
pub use sync::{SyncUpdateWatchdog, SYNC_UPDATE_TIMEOUT};
pub use workers::{RenderPool, RowPainter};
