//! File-descriptor multiplexer contract.
//!
//! The core never owns the event loop; the host implements this over
//! epoll/poll/kqueue and dispatches readiness back to registered
//! handlers. Suspension points are exactly the multiplexer waits; no
//! handler may block.

use std::io;
use std::os::fd::RawFd;

use bitflags::bitflags;

bitflags! {
    /// Readiness interests / reported events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interest: u8 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
        /// Peer hangup; always reported, never requested.
        const HUP   = 1 << 2;
    }
}

/// A readiness callback for one registered descriptor.
pub trait EventHandler {
    /// Called when `fd` is ready. Returning `false` deregisters the
    /// descriptor.
    fn ready(&mut self, fd: RawFd, events: Interest) -> bool;
}

/// The multiplexer the host event loop implements.
///
/// Registration is level-triggered: a writable pty master will keep
/// firing until the write interest is dropped, which is how the write
/// FIFOs drain.
pub trait Multiplexer {
    fn register(
        &mut self,
        fd: RawFd,
        interest: Interest,
        handler: Box<dyn EventHandler>,
    ) -> io::Result<()>;

    /// Change the interest set of an already-registered descriptor.
    fn modify(&mut self, fd: RawFd, interest: Interest) -> io::Result<()>;

    fn unregister(&mut self, fd: RawFd) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-memory multiplexer proving the contract is object-safe
    /// and usable for dispatch tests.
    #[derive(Default)]
    struct FakeMux {
        entries: Vec<(RawFd, Interest, Box<dyn EventHandler>)>,
    }

    impl FakeMux {
        fn fire(&mut self, fd: RawFd, events: Interest) {
            let mut keep = true;
            for (efd, _, handler) in &mut self.entries {
                if *efd == fd {
                    keep = handler.ready(fd, events);
                }
            }
            if !keep {
                self.entries.retain(|(efd, _, _)| *efd != fd);
            }
        }
    }

    impl Multiplexer for FakeMux {
        fn register(
            &mut self,
            fd: RawFd,
            interest: Interest,
            handler: Box<dyn EventHandler>,
        ) -> io::Result<()> {
            self.entries.push((fd, interest, handler));
            Ok(())
        }

        fn modify(&mut self, fd: RawFd, interest: Interest) -> io::Result<()> {
            for (efd, i, _) in &mut self.entries {
                if *efd == fd {
                    *i = interest;
                }
            }
            Ok(())
        }

        fn unregister(&mut self, fd: RawFd) -> io::Result<()> {
            self.entries.retain(|(efd, _, _)| *efd != fd);
            Ok(())
        }
    }

    struct Counter(std::rc::Rc<std::cell::Cell<u32>>, bool);

    impl EventHandler for Counter {
        fn ready(&mut self, _fd: RawFd, _events: Interest) -> bool {
            self.0.set(self.0.get() + 1);
            self.1
        }
    }

    #[test]
    fn dispatch_and_deregister_on_false() {
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut mux = FakeMux::default();
        mux.register(3, Interest::READ, Box::new(Counter(count.clone(), true)))
            .unwrap();
        mux.register(4, Interest::READ, Box::new(Counter(count.clone(), false)))
            .unwrap();

        mux.fire(3, Interest::READ);
        mux.fire(4, Interest::READ);
        mux.fire(4, Interest::READ); // deregistered; no further calls
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn interest_bits_compose() {
        let both = Interest::READ | Interest::WRITE;
        assert!(both.contains(Interest::READ));
        assert!(both.contains(Interest::WRITE));
        assert!(!both.contains(Interest::HUP));
    }
}
