//! The buffer pool: per-cookie caches and scroll-by-remap.

use petrel_core::Damage;
use tracing::{debug, error};

use crate::binding::{BufferHandle, PoolId, ShmBinding};
use crate::mem::ShmRegion;

/// Default backing-file ceiling for scrollable buffers.
///
/// The producer never maps more than this per buffer, and the address
/// space cost is virtual; 512 MiB leaves the compositor room to map many
/// terminals at once.
pub const DEFAULT_MAX_POOL_SIZE: u64 = 512 * 1024 * 1024;

const BYTES_PER_PIXEL: usize = 4;

/// Pixel-rect dirty tracking, kept as a single bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub x1: usize,
    pub y1: usize,
    pub x2: usize,
    pub y2: usize,
}

/// One pooled frame buffer.
///
/// While `busy` the compositor owns the pixels and the producer must not
/// write; `release` (via [`Pool::buffer_released`]) hands them back.
#[derive(Debug)]
pub struct Buffer {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    /// Bytes of one frame (`stride * height`).
    pub size: usize,

    region: ShmRegion,
    pool_id: PoolId,
    pub handle: BufferHandle,
    /// Origin of the frame within the backing region.
    pub offset: u64,

    pub cookie: u64,
    pub busy: bool,
    pub purge: bool,
    /// Frames since this buffer's content was last current.
    pub age: u32,
    scrollable: bool,

    pub scroll_damage: Vec<Damage>,
    pub dirty: Option<DirtyRect>,
    /// Hole-punch operations performed (diagnostics).
    pub punched: u64,
}

impl Buffer {
    /// The frame's pixel bytes.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.region.window_mut(self.offset, self.size)
    }

    /// Stable base address of the backing mapping.
    #[must_use]
    pub fn mmap_base(&self) -> usize {
        self.region.base_addr()
    }

    /// Grow the dirty bounding box.
    pub fn add_dirty(&mut self, rect: DirtyRect) {
        self.dirty = Some(match self.dirty {
            None => rect,
            Some(cur) => DirtyRect {
                x1: cur.x1.min(rect.x1),
                y1: cur.y1.min(rect.y1),
                x2: cur.x2.max(rect.x2),
                y2: cur.y2.max(rect.y2),
            },
        });
    }
}

/// Buffer cache keyed by `(width, height, cookie)`.
#[derive(Debug, Default)]
pub struct Pool {
    buffers: Vec<Buffer>,
    max_pool_size: u64,
    /// Probed on first allocation; `Some(false)` disables scroll support.
    can_punch_hole: Option<bool>,
    next_serial: u64,
}

impl Pool {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_pool_size(DEFAULT_MAX_POOL_SIZE)
    }

    #[must_use]
    pub fn with_max_pool_size(max_pool_size: u64) -> Self {
        Self {
            buffers: Vec::new(),
            max_pool_size,
            can_punch_hole: None,
            next_serial: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Acquire a buffer for `(width, height, cookie)`.
    ///
    /// Purges stale buffers for the cookie, reuses a non-busy match, ages a
    /// busy one, or allocates. Allocation failure is fatal: the renderer
    /// has no correct fallback, so the process aborts with a diagnostic.
    pub fn get(
        &mut self,
        binding: &mut dyn ShmBinding,
        width: usize,
        height: usize,
        cookie: u64,
        scrollable: bool,
    ) -> &mut Buffer {
        // Drop buffers previously marked for purging under this cookie.
        let mut i = 0;
        while i < self.buffers.len() {
            let buf = &self.buffers[i];
            if buf.cookie == cookie && buf.purge {
                debug_assert!(!buf.busy);
                debug!(cookie, size = buf.size, "purging buffer");
                let buf = self.buffers.remove(i);
                binding.destroy_buffer(buf.handle);
                binding.destroy_pool(buf.pool_id);
            } else {
                i += 1;
            }
        }

        // Cache hit? Busy matches age; the first idle match is reused.
        let mut hit = None;
        for (i, buf) in self.buffers.iter_mut().enumerate() {
            if buf.width != width || buf.height != height || buf.cookie != cookie {
                continue;
            }
            if buf.busy {
                buf.age += 1;
            } else if hit.is_none() {
                hit = Some(i);
            }
        }
        if let Some(i) = hit {
            let buf = &mut self.buffers[i];
            buf.busy = true;
            buf.purge = false;
            buf.age = 0;
            buf.dirty = None;
            buf.scroll_damage.clear();
            return &mut self.buffers[i];
        }

        // Mark mismatching idle buffers for purge on the next get.
        for buf in &mut self.buffers {
            if buf.cookie == cookie && !buf.busy && (buf.width != width || buf.height != height)
            {
                buf.purge = true;
            }
        }

        let buf = self.allocate(binding, width, height, cookie, scrollable);
        self.buffers.push(buf);
        let last = self.buffers.len() - 1;
        &mut self.buffers[last]
    }

    fn allocate(
        &mut self,
        binding: &mut dyn ShmBinding,
        width: usize,
        height: usize,
        cookie: u64,
        scrollable: bool,
    ) -> Buffer {
        let stride = width * BYTES_PER_PIXEL;
        let size = stride * height;
        debug!(cookie, size, scrollable, "allocating new buffer");

        // Scroll-by-remap needs the large sparse backing file, a 64-bit
        // address space, and hole-punch support.
        let mut scrollable =
            scrollable && cfg!(target_pointer_width = "64") && self.max_pool_size > 0;
        let mut region_size = if scrollable {
            self.max_pool_size.max(size as u64)
        } else {
            size as u64
        };
        let mut region = match ShmRegion::new(region_size) {
            Ok(region) => region,
            Err(err) => fatal(&err),
        };

        if self.can_punch_hole.is_none() {
            let ok = region.probe_punch_hole();
            if !ok {
                tracing::warn!(
                    "fallocate(PUNCH_HOLE) not supported; SHM scrolling disabled"
                );
            }
            self.can_punch_hole = Some(ok);
        }

        if scrollable && self.can_punch_hole != Some(true) {
            // Downgrade to a plain exactly-sized buffer.
            scrollable = false;
            region_size = size as u64;
            region = match ShmRegion::new(region_size) {
                Ok(region) => region,
                Err(err) => fatal(&err),
            };
        }

        let offset = if scrollable {
            (self.max_pool_size / 4) & !(page_size() - 1)
        } else {
            0
        };

        let pool_id = binding.create_pool(region.fd(), region_size);
        let handle = binding.create_buffer(
            pool_id,
            offset,
            width as u32,
            height as u32,
            stride as u32,
        );

        self.next_serial += 1;
        Buffer {
            width,
            height,
            stride,
            size,
            region,
            pool_id,
            handle,
            offset,
            cookie,
            busy: true,
            purge: false,
            // Absurd age forces a full repaint of a fresh buffer.
            age: 1234,
            scrollable,
            scroll_damage: Vec::new(),
            dirty: None,
            punched: 0,
        }
    }

    /// Look up a buffer by its current compositor handle.
    #[must_use]
    pub fn buffer(&self, handle: BufferHandle) -> Option<&Buffer> {
        self.buffers.iter().find(|b| b.handle == handle)
    }

    /// `wl_buffer.release`: the compositor handed the pixels back.
    pub fn buffer_released(&mut self, handle: BufferHandle) {
        match self.buffers.iter_mut().find(|b| b.handle == handle) {
            Some(buf) => buf.busy = false,
            None => debug!(?handle, "release for unknown buffer"),
        }
    }

    /// Mark every idle buffer under `cookie` for destruction and drop them.
    pub fn purge_cookie(&mut self, binding: &mut dyn ShmBinding, cookie: u64) {
        let mut i = 0;
        while i < self.buffers.len() {
            if self.buffers[i].cookie == cookie && !self.buffers[i].busy {
                let buf = self.buffers.remove(i);
                binding.destroy_buffer(buf.handle);
                binding.destroy_pool(buf.pool_id);
            } else {
                i += 1;
            }
        }
    }

    /// Whether [`Self::scroll`] can work on this buffer.
    #[must_use]
    pub fn can_scroll(&self, buffer: &Buffer) -> bool {
        cfg!(target_pointer_width = "64")
            && self.can_punch_hole == Some(true)
            && self.max_pool_size > 0
            && buffer.scrollable
    }

    /// Scroll the buffer by `rows` (positive = forward/up) keeping
    /// `top_keep_rows` after `top_margin` and `bottom_keep_rows` above
    /// `bottom_margin` intact.
    ///
    /// The compositor-side buffer object is recreated at the new origin,
    /// so on success the buffer's NEW handle is returned and the old one
    /// is dead. `None` means remap-scrolling is unavailable and the
    /// caller must repaint.
    #[allow(clippy::too_many_arguments)]
    pub fn scroll(
        &mut self,
        binding: &mut dyn ShmBinding,
        handle: BufferHandle,
        rows: i32,
        top_margin: usize,
        top_keep_rows: usize,
        bottom_margin: usize,
        bottom_keep_rows: usize,
    ) -> Option<BufferHandle> {
        let can_punch = self.can_punch_hole == Some(true);
        let max_pool_size = self.max_pool_size;
        let buf = self.buffers.iter_mut().find(|b| b.handle == handle)?;
        if !(cfg!(target_pointer_width = "64")
            && can_punch
            && max_pool_size > 0
            && buf.scrollable)
            || rows == 0
        {
            return None;
        }

        let ok = if rows > 0 {
            scroll_forward(
                binding,
                buf,
                max_pool_size,
                rows as usize,
                top_margin,
                top_keep_rows,
                bottom_margin,
                bottom_keep_rows,
            )
        } else {
            scroll_reverse(
                binding,
                buf,
                max_pool_size,
                (-rows) as usize,
                top_margin,
                top_keep_rows,
                bottom_margin,
                bottom_keep_rows,
            )
        };
        ok.then_some(buf.handle)
    }
}

/// Relocate the frame to `new_offset` when the origin walks off either end
/// of the backing file: copy the frame, punch out the stale side, and
/// recreate the compositor buffer.
fn wrap_buffer(
    binding: &mut dyn ShmBinding,
    buf: &mut Buffer,
    new_offset: u64,
) -> bool {
    buf.region.copy_within(buf.offset, new_offset, buf.size);

    let (trim_ofs, trim_len) = if new_offset > buf.offset {
        (0, new_offset)
    } else {
        let ofs = new_offset + buf.size as u64;
        (ofs, buf.region.len() as u64 - ofs)
    };
    if let Err(err) = buf.region.punch_hole(trim_ofs, trim_len) {
        error!(?err, "failed to trim SHM backing memory file");
        return false;
    }
    buf.punched += 1;

    reinstantiate(binding, buf, new_offset);
    true
}

/// Destroy and recreate the compositor buffer at a new origin.
fn reinstantiate(binding: &mut dyn ShmBinding, buf: &mut Buffer, new_offset: u64) {
    binding.destroy_buffer(buf.handle);
    buf.handle = binding.create_buffer(
        buf.pool_id,
        new_offset,
        buf.width as u32,
        buf.height as u32,
        buf.stride as u32,
    );
    buf.offset = new_offset;
}

#[allow(clippy::too_many_arguments)]
fn scroll_forward(
    binding: &mut dyn ShmBinding,
    buf: &mut Buffer,
    max_pool_size: u64,
    rows: usize,
    top_margin: usize,
    top_keep_rows: usize,
    bottom_margin: usize,
    bottom_keep_rows: usize,
) -> bool {
    let stride = buf.stride;
    let diff = (rows * stride) as u64;
    debug_assert!(diff < buf.size as u64);

    if buf.offset + diff + buf.size as u64 > max_pool_size {
        debug!("memfd offset wrap around");
        if !wrap_buffer(binding, buf, 0) {
            return false;
        }
    }
    let new_offset = buf.offset + diff;

    if top_keep_rows > 0 {
        // The kept top region keeps its on-screen position, which is
        // `rows` further down in the shifted window.
        buf.region.copy_within(
            buf.offset + (top_margin * stride) as u64,
            buf.offset + ((top_margin + rows) * stride) as u64,
            top_keep_rows * stride,
        );
    }

    // Release everything before the new origin.
    if let Err(err) = buf.region.punch_hole(0, new_offset) {
        error!(?err, "failed to trim SHM backing memory file");
        return false;
    }
    buf.punched += 1;

    reinstantiate(binding, buf, new_offset);

    if bottom_keep_rows > 0 {
        let size = buf.size as u64;
        buf.region.copy_within(
            new_offset + size - ((bottom_margin + rows + bottom_keep_rows) * stride) as u64,
            new_offset + size - ((bottom_margin + bottom_keep_rows) * stride) as u64,
            bottom_keep_rows * stride,
        );
    }
    true
}

#[allow(clippy::too_many_arguments)]
fn scroll_reverse(
    binding: &mut dyn ShmBinding,
    buf: &mut Buffer,
    max_pool_size: u64,
    rows: usize,
    top_margin: usize,
    top_keep_rows: usize,
    bottom_margin: usize,
    bottom_keep_rows: usize,
) -> bool {
    let stride = buf.stride;
    let diff = (rows * stride) as u64;

    if diff > buf.offset {
        debug!("memfd offset reverse wrap around");
        let target = (max_pool_size - buf.size as u64) & !(page_size() - 1);
        if !wrap_buffer(binding, buf, target) {
            return false;
        }
    }
    let new_offset = buf.offset - diff;

    if bottom_keep_rows > 0 {
        let size = buf.size as u64;
        buf.region.copy_within(
            buf.offset + size - ((bottom_margin + bottom_keep_rows) * stride) as u64,
            buf.offset + size - ((bottom_margin + rows + bottom_keep_rows) * stride) as u64,
            bottom_keep_rows * stride,
        );
    }

    // Release everything after the relocated frame.
    let trim_ofs = new_offset + buf.size as u64;
    let trim_len = buf.region.len() as u64 - trim_ofs;
    if let Err(err) = buf.region.punch_hole(trim_ofs, trim_len) {
        error!(?err, "failed to trim SHM backing memory file");
        return false;
    }
    buf.punched += 1;

    reinstantiate(binding, buf, new_offset);

    if top_keep_rows > 0 {
        buf.region.copy_within(
            new_offset + ((top_margin + rows) * stride) as u64,
            new_offset + (top_margin * stride) as u64,
            top_keep_rows * stride,
        );
    }
    true
}

fn page_size() -> u64 {
    rustix::param::page_size() as u64
}

/// SHM exhaustion is unrecoverable: log and abort per the error contract.
fn fatal(err: &dyn std::error::Error) -> ! {
    error!(%err, "unrecoverable SHM failure");
    eprintln!("fatal: {err}");
    std::process::abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::RecordingBinding;

    const COOKIE_GRID: u64 = 1;
    const COOKIE_SEARCH: u64 = 2;

    #[test]
    fn allocate_and_reuse_by_cookie() {
        let mut pool = Pool::with_max_pool_size(0);
        let mut binding = RecordingBinding::new();

        let handle = pool.get(&mut binding, 64, 32, COOKIE_GRID, false).handle;
        assert_eq!(pool.len(), 1);

        pool.buffer_released(handle);
        let again = pool.get(&mut binding, 64, 32, COOKIE_GRID, false);
        assert_eq!(again.handle, handle);
        assert!(again.busy);
        assert_eq!(again.age, 0);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn reuse_resets_accumulated_age() {
        let mut pool = Pool::with_max_pool_size(0);
        let mut binding = RecordingBinding::new();

        let first = pool.get(&mut binding, 64, 32, COOKIE_GRID, false).handle;
        // While `first` stays busy, repeated gets age it well past its
        // initial force-repaint value.
        for _ in 0..3 {
            let other = pool.get(&mut binding, 64, 32, COOKIE_GRID, false).handle;
            pool.buffer_released(other);
        }
        assert!(pool.buffer(first).unwrap().age > 1234);

        pool.buffer_released(first);
        let reused = pool.get(&mut binding, 64, 32, COOKIE_GRID, false);
        assert_eq!(reused.handle, first);
        assert_eq!(reused.age, 0);
    }

    #[test]
    fn busy_buffer_ages_and_second_allocates() {
        let mut pool = Pool::with_max_pool_size(0);
        let mut binding = RecordingBinding::new();

        let first = pool.get(&mut binding, 64, 32, COOKIE_GRID, false).handle;
        // Not released: still busy, so a second get allocates.
        let second = pool.get(&mut binding, 64, 32, COOKIE_GRID, false).handle;
        assert_ne!(first, second);
        assert_eq!(pool.len(), 2);
        let aged = pool
            .buffers
            .iter()
            .find(|b| b.handle == first)
            .unwrap()
            .age;
        assert!(aged > 1234);
    }

    #[test]
    fn size_change_purges_old_buffer() {
        let mut pool = Pool::with_max_pool_size(0);
        let mut binding = RecordingBinding::new();

        let old = pool.get(&mut binding, 64, 32, COOKIE_GRID, false).handle;
        pool.buffer_released(old);

        // A different size marks the old buffer; the next get drops it.
        let _new = pool.get(&mut binding, 80, 40, COOKIE_GRID, false).handle;
        assert!(pool.buffers.iter().any(|b| b.purge));
        let newer = pool.get(&mut binding, 80, 40, COOKIE_GRID, false).handle;
        let _ = newer;
        assert!(binding.destroyed_buffers.contains(&old));
        assert!(pool.buffers.iter().all(|b| b.cookie != COOKIE_GRID || !b.purge));
    }

    #[test]
    fn cookies_are_independent() {
        let mut pool = Pool::with_max_pool_size(0);
        let mut binding = RecordingBinding::new();

        let grid = pool.get(&mut binding, 64, 32, COOKIE_GRID, false).handle;
        let search = pool.get(&mut binding, 64, 32, COOKIE_SEARCH, false).handle;
        assert_ne!(grid, search);
        assert_eq!(pool.len(), 2);

        pool.buffer_released(grid);
        pool.buffer_released(search);
        pool.purge_cookie(&mut binding, COOKIE_SEARCH);
        assert_eq!(pool.len(), 1);
        assert!(binding.destroyed_buffers.contains(&search));
    }

    #[test]
    fn pixels_are_writable_and_sized() {
        let mut pool = Pool::with_max_pool_size(0);
        let mut binding = RecordingBinding::new();
        let buf = pool.get(&mut binding, 16, 4, COOKIE_GRID, false);
        assert_eq!(buf.pixels_mut().len(), 16 * 4 * 4);
        buf.pixels_mut()[0] = 0x7f;
        assert_eq!(buf.pixels_mut()[0], 0x7f);
    }

    #[test]
    fn scrollable_buffer_starts_at_quarter_offset() {
        let max = 16 * 1024 * 1024;
        let mut pool = Pool::with_max_pool_size(max);
        let mut binding = RecordingBinding::new();
        let offset = pool.get(&mut binding, 8, 8, COOKIE_GRID, true).offset;
        if pool.can_punch_hole == Some(true) {
            assert_ne!(offset, 0);
            assert!(offset <= max / 4);
        }
    }

    #[test]
    fn scroll_forward_moves_origin_and_punches_once() {
        let mut pool = Pool::with_max_pool_size(16 * 1024 * 1024);
        let mut binding = RecordingBinding::new();
        let (handle, stride, offset, base) = {
            let buf = pool.get(&mut binding, 8, 8, COOKIE_GRID, true);
            (buf.handle, buf.stride, buf.offset, buf.mmap_base())
        };
        if pool.can_punch_hole != Some(true) {
            return; // filesystem without hole punching
        }

        let new_handle = pool.scroll(&mut binding, handle, 2, 0, 0, 0, 0).unwrap();
        let buf = pool.buffer(new_handle).unwrap();
        assert_eq!(buf.offset, offset + 2 * stride as u64);
        assert_eq!(buf.punched, 1);
        assert_eq!(buf.mmap_base(), base);
        // Compositor-side object was recreated at the new offset.
        assert_eq!(binding.destroyed_buffers, vec![handle]);
    }

    #[test]
    fn scroll_keeps_margin_regions() {
        let mut pool = Pool::with_max_pool_size(16 * 1024 * 1024);
        let mut binding = RecordingBinding::new();
        let handle = {
            let buf = pool.get(&mut binding, 4, 8, COOKIE_GRID, true);
            // Row pattern: row i filled with byte i.
            let stride = buf.stride;
            let pixels = buf.pixels_mut();
            for row in 0..8 {
                for b in &mut pixels[row * stride..(row + 1) * stride] {
                    *b = row as u8;
                }
            }
            buf.handle
        };
        if pool.can_punch_hole != Some(true) {
            return;
        }

        // Scroll forward by 2, keeping 1 top row ("header") in place.
        let handle = pool.scroll(&mut binding, handle, 2, 0, 1, 0, 0).unwrap();
        let buf = pool
            .buffers
            .iter_mut()
            .find(|b| b.handle == handle)
            .unwrap();
        let stride = buf.stride;
        let pixels = buf.pixels_mut();
        // The header row followed the origin shift: still row 0.
        assert_eq!(pixels[0], 0);
        // Content shifted up by two: new row i shows old row i + 2.
        assert_eq!(pixels[2 * stride], 4);
        assert_eq!(pixels[5 * stride], 7);
        // Rows scrolled in from past the old frame are untouched (zero).
        assert_eq!(pixels[7 * stride], 0);
    }

    #[test]
    fn reverse_scroll_restores_origin() {
        let mut pool = Pool::with_max_pool_size(16 * 1024 * 1024);
        let mut binding = RecordingBinding::new();
        let (handle, offset0) = {
            let buf = pool.get(&mut binding, 8, 8, COOKIE_GRID, true);
            (buf.handle, buf.offset)
        };
        if pool.can_punch_hole != Some(true) {
            return;
        }

        let handle = pool.scroll(&mut binding, handle, 3, 0, 0, 0, 0).unwrap();
        let handle = pool.scroll(&mut binding, handle, -3, 0, 0, 0, 0).unwrap();
        assert_eq!(pool.buffer(handle).unwrap().offset, offset0);
    }

    #[test]
    fn forward_wrap_when_origin_reaches_the_end() {
        // Tiny backing file so repeated scrolls hit the wrap path.
        let max = 16 * 4096u64;
        let mut pool = Pool::with_max_pool_size(max);
        let mut binding = RecordingBinding::new();
        let mut handle = {
            let buf = pool.get(&mut binding, 8, 8, COOKIE_GRID, true);
            buf.handle
        };
        if pool.can_punch_hole != Some(true) {
            return;
        }
        let mut wrapped = false;
        let mut last_offset = pool.buffers[0].offset;
        for _ in 0..2000 {
            handle = pool.scroll(&mut binding, handle, 1, 0, 0, 0, 0).unwrap();
            let buf = pool.buffer(handle).unwrap();
            assert!(buf.offset + buf.size as u64 <= max);
            if buf.offset < last_offset {
                wrapped = true;
            }
            last_offset = buf.offset;
        }
        assert!(wrapped);
    }

    #[test]
    fn non_scrollable_buffer_refuses_to_scroll() {
        let mut pool = Pool::with_max_pool_size(16 * 1024 * 1024);
        let mut binding = RecordingBinding::new();
        let handle = {
            let buf = pool.get(&mut binding, 8, 8, COOKIE_GRID, false);
            buf.handle
        };
        assert!(pool.scroll(&mut binding, handle, 1, 0, 0, 0, 0).is_none());
    }

    #[test]
    fn dirty_rect_accumulates() {
        let mut pool = Pool::with_max_pool_size(0);
        let mut binding = RecordingBinding::new();
        let buf = pool.get(&mut binding, 16, 16, COOKIE_GRID, false);
        buf.add_dirty(DirtyRect {
            x1: 2,
            y1: 2,
            x2: 4,
            y2: 4,
        });
        buf.add_dirty(DirtyRect {
            x1: 8,
            y1: 1,
            x2: 12,
            y2: 3,
        });
        assert_eq!(
            buf.dirty,
            Some(DirtyRect {
                x1: 2,
                y1: 1,
                x2: 12,
                y2: 4
            })
        );
    }
}
