//! Scroll-optimized shared-memory buffer pool.
//!
//! Rendered frames live in sealed memfd regions shared with the
//! compositor. Scrollable buffers are placed inside a much larger backing
//! file so that logical scrolling becomes pointer arithmetic: the buffer's
//! origin moves within the file, the compositor-side buffer object is
//! recreated at the new offset, and the bytes left behind are released
//! with `fallocate(PUNCH_HOLE)` instead of being copied.
//!
//! The compositor side (`wl_shm` and friends) is reached only through the
//! object-safe [`ShmBinding`] contract, so the pool's cache, purge, and
//! scroll logic runs headless under test.
//!
//! Linux-only: the backing store is a sealed memfd.

pub mod binding;
pub mod mem;
pub mod pool;

pub use binding::{BufferHandle, PoolId, ShmBinding};
pub use mem::{ShmError, ShmRegion};
pub use pool::{Buffer, DirtyRect, Pool, DEFAULT_MAX_POOL_SIZE};
