//! The compositor-side contract.
//!
//! The pool never talks to `wl_shm` directly; the host implements this
//! trait over its Wayland connection and forwards `wl_buffer.release`
//! events back via [`crate::Pool::buffer_released`].

use std::os::fd::BorrowedFd;

/// Opaque id for a compositor-side pool object (`wl_shm_pool`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(pub u64);

/// Opaque id for a compositor-side buffer object (`wl_buffer`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Compositor shared-memory binding.
///
/// Formats are fixed to 32-bit ARGB; `stride` is bytes per row.
pub trait ShmBinding {
    fn create_pool(&mut self, fd: BorrowedFd<'_>, size: u64) -> PoolId;
    fn create_buffer(
        &mut self,
        pool: PoolId,
        offset: u64,
        width: u32,
        height: u32,
        stride: u32,
    ) -> BufferHandle;
    fn destroy_buffer(&mut self, buffer: BufferHandle);
    fn destroy_pool(&mut self, pool: PoolId);
}

/// A recording fake for tests: hands out sequential ids and remembers the
/// calls it saw.
#[derive(Debug, Default)]
pub struct RecordingBinding {
    next_id: u64,
    pub pools: Vec<(PoolId, u64)>,
    pub buffers: Vec<(BufferHandle, PoolId, u64, u32, u32)>,
    pub destroyed_buffers: Vec<BufferHandle>,
    pub destroyed_pools: Vec<PoolId>,
}

impl RecordingBinding {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl ShmBinding for RecordingBinding {
    fn create_pool(&mut self, _fd: BorrowedFd<'_>, size: u64) -> PoolId {
        let id = PoolId(self.next());
        self.pools.push((id, size));
        id
    }

    fn create_buffer(
        &mut self,
        pool: PoolId,
        offset: u64,
        width: u32,
        height: u32,
        _stride: u32,
    ) -> BufferHandle {
        let id = BufferHandle(self.next());
        self.buffers.push((id, pool, offset, width, height));
        id
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.destroyed_buffers.push(buffer);
    }

    fn destroy_pool(&mut self, pool: PoolId) {
        self.destroyed_pools.push(pool);
    }
}
