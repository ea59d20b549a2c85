//! Child-process reaper contract.
//!
//! The slave's exit is reported exactly once through the registered
//! callback; the core does not retry or respawn.

/// Invoked with the child's exit status (waitpid semantics).
pub type ExitCallback = Box<dyn FnOnce(i32) + Send>;

pub trait Reaper {
    /// Watch `pid`; `on_exit` fires when it is reaped.
    fn add_child(&mut self, pid: i32, on_exit: ExitCallback);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[derive(Default)]
    struct FakeReaper {
        watched: Vec<(i32, ExitCallback)>,
    }

    impl FakeReaper {
        fn reap(&mut self, pid: i32, status: i32) {
            let mut i = 0;
            while i < self.watched.len() {
                if self.watched[i].0 == pid {
                    let (_, cb) = self.watched.remove(i);
                    cb(status);
                } else {
                    i += 1;
                }
            }
        }
    }

    impl Reaper for FakeReaper {
        fn add_child(&mut self, pid: i32, on_exit: ExitCallback) {
            self.watched.push((pid, on_exit));
        }
    }

    #[test]
    fn exit_status_reaches_callback_once() {
        let (tx, rx) = mpsc::channel();
        let mut reaper = FakeReaper::default();
        reaper.add_child(1234, Box::new(move |status| tx.send(status).unwrap()));
        reaper.reap(1234, 7);
        reaper.reap(1234, 8); // already reaped; callback consumed
        assert_eq!(rx.try_recv(), Ok(7));
        assert!(rx.try_recv().is_err());
    }
}
