//! Fixed pool of render workers.
//!
//! The main thread posts a batch of dirty row indices and waits for the
//! batch to complete before submitting the buffer. Workers never touch
//! grid structure; the painter closure reads cells and writes pixels.
//! Between frames the workers sit blocked on the job channel; there is
//! no cancellation path because a frame is always drained.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::error;

/// Paints one row of the current frame. Implementations capture the frame
/// state (cell snapshot + pixel target) behind `Arc`s of their own.
pub trait RowPainter: Send + Sync {
    fn paint_row(&self, row: usize);
}

enum Job {
    Row(usize),
    Shutdown,
}

/// The worker pool. Dropping it shuts the workers down cleanly.
pub struct RenderPool {
    job_tx: Sender<Job>,
    done_rx: Receiver<usize>,
    workers: Vec<JoinHandle<()>>,
}

impl RenderPool {
    /// Spawn `count` workers (0 = one per logical CPU) painting through
    /// `painter`.
    #[must_use]
    pub fn new(count: usize, painter: Arc<dyn RowPainter>) -> Self {
        let count = if count == 0 {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            count
        };
        let (job_tx, job_rx) = unbounded::<Job>();
        let (done_tx, done_rx) = unbounded::<usize>();

        let workers = (0..count)
            .map(|i| {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let painter = Arc::clone(&painter);
                std::thread::Builder::new()
                    .name(format!("render-{i}"))
                    .spawn(move || {
                        while let Ok(job) = job_rx.recv() {
                            match job {
                                Job::Row(row) => {
                                    painter.paint_row(row);
                                    if done_tx.send(row).is_err() {
                                        break;
                                    }
                                }
                                Job::Shutdown => break,
                            }
                        }
                    })
                    .expect("failed to spawn render worker")
            })
            .collect();

        Self {
            job_tx,
            done_rx,
            workers,
        }
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Paint a batch of rows, blocking until every row is done.
    pub fn paint_batch(&self, rows: impl IntoIterator<Item = usize>) {
        let mut posted = 0usize;
        for row in rows {
            if self.job_tx.send(Job::Row(row)).is_err() {
                error!("render worker pool is gone; dropping batch");
                return;
            }
            posted += 1;
        }
        for _ in 0..posted {
            if self.done_rx.recv().is_err() {
                error!("render worker died mid-frame");
                return;
            }
        }
    }
}

impl Drop for RenderPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.job_tx.send(Job::Shutdown);
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingPainter {
        painted: Mutex<Vec<usize>>,
        calls: AtomicUsize,
    }

    impl CountingPainter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                painted: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl RowPainter for CountingPainter {
        fn paint_row(&self, row: usize) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.painted.lock().unwrap().push(row);
        }
    }

    #[test]
    fn batch_paints_every_row_before_returning() {
        let painter = CountingPainter::new();
        let pool = RenderPool::new(4, painter.clone());
        pool.paint_batch(0..64);
        assert_eq!(painter.calls.load(Ordering::SeqCst), 64);
        let mut rows = painter.painted.lock().unwrap().clone();
        rows.sort_unstable();
        assert_eq!(rows, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn sequential_batches_reuse_the_pool() {
        let painter = CountingPainter::new();
        let pool = RenderPool::new(2, painter.clone());
        for _ in 0..10 {
            pool.paint_batch([1, 2, 3]);
        }
        assert_eq!(painter.calls.load(Ordering::SeqCst), 30);
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let painter = CountingPainter::new();
        let pool = RenderPool::new(1, painter.clone());
        pool.paint_batch(std::iter::empty());
        assert_eq!(painter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_count_defaults_to_parallelism() {
        let painter = CountingPainter::new();
        let pool = RenderPool::new(0, painter);
        assert!(pool.worker_count() >= 1);
    }

    #[test]
    fn drop_joins_workers() {
        let painter = CountingPainter::new();
        let pool = RenderPool::new(3, painter.clone());
        pool.paint_batch(0..8);
        drop(pool);
        assert_eq!(painter.calls.load(Ordering::SeqCst), 8);
    }
}
