//! Buffered writes toward the pseudoterminal master.
//!
//! Writes are queued and drained when the master becomes writable; nothing
//! in the interpreter blocks. Paste data uses its own queue so in-flight
//! non-paste writes (replies, keystrokes) drain ahead of large pastes.

use std::collections::VecDeque;
use std::io;

/// FIFO of pending write chunks with a partial-write cursor.
#[derive(Debug, Default)]
pub struct PtyQueue {
    chunks: VecDeque<Vec<u8>>,
    /// Bytes of the front chunk already written.
    front_written: usize,
}

impl PtyQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total bytes still pending.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.chunks
            .iter()
            .map(Vec::len)
            .sum::<usize>()
            .saturating_sub(self.front_written)
    }

    pub fn push(&mut self, data: impl Into<Vec<u8>>) {
        let data = data.into();
        if !data.is_empty() {
            self.chunks.push_back(data);
        }
    }

    /// Drain as much as `write` accepts. `write` returns the number of
    /// bytes taken, `Ok(0)` to stop (would-block), or an error to abort
    /// the whole queue (EPIPE: the reader is gone, pending data is freed).
    pub fn drain_with<W>(&mut self, mut write: W) -> io::Result<()>
    where
        W: FnMut(&[u8]) -> io::Result<usize>,
    {
        while let Some(front) = self.chunks.front() {
            let remaining = &front[self.front_written..];
            match write(remaining) {
                Ok(0) => return Ok(()),
                Ok(n) => {
                    self.front_written += n.min(remaining.len());
                    if self.front_written >= front.len() {
                        self.chunks.pop_front();
                        self.front_written = 0;
                    }
                }
                Err(err) => {
                    self.chunks.clear();
                    self.front_written = 0;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.front_written = 0;
    }
}
