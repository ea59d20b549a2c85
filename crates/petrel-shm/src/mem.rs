//! Sealed memfd + whole-region mmap.
//!
//! The only unsafe code in the workspace lives here: the region is mapped
//! once at creation and unmapped on drop, so the base pointer is stable
//! for the lifetime of the value and the byte-slice views cannot outlive
//! the mapping.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::ptr;

use rustix::fs::{FallocateFlags, MemfdFlags, SealFlags};
use rustix::mm::{MapFlags, ProtFlags};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ShmError {
    #[error("failed to create SHM backing memory file: {0}")]
    Create(#[source] rustix::io::Errno),
    #[error("failed to size SHM backing memory file: {0}")]
    Truncate(#[source] rustix::io::Errno),
    #[error("failed to map SHM backing memory file: {0}")]
    Map(#[source] rustix::io::Errno),
    #[error("failed to trim SHM backing memory file: {0}")]
    PunchHole(#[source] rustix::io::Errno),
}

/// A sealed, fully-mapped anonymous memory file.
#[derive(Debug)]
pub struct ShmRegion {
    fd: OwnedFd,
    base: *mut u8,
    size: usize,
}

// The region is plain shared memory; the pool hands out exclusive access
// through &mut.
unsafe impl Send for ShmRegion {}
unsafe impl Sync for ShmRegion {}

impl ShmRegion {
    /// Create a region of `size` bytes, sealed against resizing.
    pub fn new(size: u64) -> Result<Self, ShmError> {
        let fd = rustix::fs::memfd_create(
            "petrel-shm-pool",
            MemfdFlags::CLOEXEC | MemfdFlags::ALLOW_SEALING,
        )
        .map_err(ShmError::Create)?;
        rustix::fs::ftruncate(&fd, size).map_err(ShmError::Truncate)?;

        // The compositor maps PROT_WRITE, so FUTURE_WRITE cannot be sealed.
        if let Err(err) = rustix::fs::fcntl_add_seals(
            &fd,
            SealFlags::GROW | SealFlags::SHRINK | SealFlags::SEAL,
        ) {
            warn!(?err, "failed to seal SHM backing memory file");
        }

        let base = unsafe {
            rustix::mm::mmap(
                ptr::null_mut(),
                size as usize,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                &fd,
                0,
            )
        }
        .map_err(ShmError::Map)?;

        Ok(Self {
            fd,
            base: base.cast(),
            size: size as usize,
        })
    }

    #[must_use]
    pub fn fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Stable base address of the mapping (diagnostics and tests).
    #[must_use]
    pub fn base_addr(&self) -> usize {
        self.base as usize
    }

    /// The whole region as bytes.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.base, self.size) }
    }

    /// A window of the region as bytes.
    pub fn window_mut(&mut self, offset: u64, len: usize) -> &mut [u8] {
        let offset = offset as usize;
        assert!(offset + len <= self.size, "window outside SHM region");
        unsafe { std::slice::from_raw_parts_mut(self.base.add(offset), len) }
    }

    /// Overlapping-safe copy inside the region (memmove).
    pub fn copy_within(&mut self, src: u64, dst: u64, len: usize) {
        let (src, dst) = (src as usize, dst as usize);
        assert!(src + len <= self.size && dst + len <= self.size);
        unsafe {
            ptr::copy(self.base.add(src), self.base.add(dst), len);
        }
    }

    /// Release physical pages without shrinking the file.
    pub fn punch_hole(&self, offset: u64, len: u64) -> Result<(), ShmError> {
        if len == 0 {
            return Ok(());
        }
        rustix::fs::fallocate(
            &self.fd,
            FallocateFlags::PUNCH_HOLE | FallocateFlags::KEEP_SIZE,
            offset,
            len,
        )
        .map_err(ShmError::PunchHole)
    }

    /// Runtime probe: does this file support hole punching? Some
    /// filesystems (older tmpfs) do not.
    #[must_use]
    pub fn probe_punch_hole(&self) -> bool {
        self.punch_hole(0, 1).is_ok()
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        unsafe {
            let _ = rustix::mm::munmap(self.base.cast(), self.size);
        }
    }
}
