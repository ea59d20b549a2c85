//! Long-haul scroll scenario: a 700×500 scrollable buffer inside a
//! 512 MiB backing file survives 10,000 one-row forward scrolls without
//! ever remapping, punching exactly one hole per operation.

use petrel_shm::binding::RecordingBinding;
use petrel_shm::{Pool, DEFAULT_MAX_POOL_SIZE};

#[test]
fn ten_thousand_single_row_scrolls() {
    let mut pool = Pool::with_max_pool_size(DEFAULT_MAX_POOL_SIZE);
    let mut binding = RecordingBinding::new();

    let (mut handle, base, start_offset, stride) = {
        let buf = pool.get(&mut binding, 700, 500, 0xfeed, true);
        (buf.handle, buf.mmap_base(), buf.offset, buf.stride as u64)
    };

    let Some(first) = pool.scroll(&mut binding, handle, 1, 0, 0, 0, 0) else {
        // Host filesystem cannot punch holes; nothing to measure.
        return;
    };
    handle = first;
    for _ in 1..10_000u32 {
        handle = pool
            .scroll(&mut binding, handle, 1, 0, 0, 0, 0)
            .expect("scrollable buffer must keep scrolling");
    }

    let buf = pool.buffer(handle).expect("buffer still pooled");
    assert_eq!(buf.mmap_base(), base, "mmap base must never move");
    assert_eq!(buf.offset, start_offset + 10_000 * stride);
    assert_eq!(buf.punched, 10_000, "exactly one hole per scroll");
}
