//! Counting wake signal between producers and the transmitter.
//!
//! Raising the signal is an atomic increment followed by an unpark of the
//! waiting thread: no lock, no allocation, no blocking. The first thread to
//! wait becomes the waiter for the signal's lifetime.

use std::sync::atomic::{fence, AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

/// Why a wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// A permit was consumed; new data may be queued.
    Data,
    /// Shutdown was requested.
    Shutdown,
}

/// Counting semaphore with a shutdown input, for a single waiting thread.
#[derive(Default)]
pub struct WakeSignal {
    permits: AtomicUsize,
    shutdown: AtomicBool,
    waiter: OnceLock<Thread>,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal from a regular thread.
    pub fn post(&self) {
        self.raise();
    }

    /// Raise the signal from an interrupt-like context.
    ///
    /// Same operation as [`post`](Self::post): neither logs nor allocates.
    pub fn post_from_isr(&self) {
        self.raise();
    }

    /// Ask the waiter to stop. Observed by every subsequent wait.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.unpark_waiter();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Permits raised but not yet consumed.
    pub fn pending(&self) -> usize {
        self.permits.load(Ordering::Acquire)
    }

    /// Block until a permit is available or shutdown is requested.
    ///
    /// Shutdown takes precedence over pending permits.
    pub fn wait(&self) -> Wake {
        self.bind_waiter();
        loop {
            if let Some(wake) = self.try_wake() {
                return wake;
            }
            thread::park();
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Wake> {
        self.bind_waiter();
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(wake) = self.try_wake() {
                return Some(wake);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::park_timeout(deadline - now);
        }
    }

    fn raise(&self) {
        self.permits.fetch_add(1, Ordering::Release);
        self.unpark_waiter();
    }

    fn unpark_waiter(&self) {
        // Pairs with the fence in `bind_waiter` so a raise racing the first
        // wait either sees the waiter or is seen by it.
        fence(Ordering::SeqCst);
        if let Some(waiter) = self.waiter.get() {
            waiter.unpark();
        }
    }

    fn bind_waiter(&self) {
        let waiter = self.waiter.get_or_init(thread::current);
        debug_assert_eq!(
            waiter.id(),
            thread::current().id(),
            "WakeSignal supports a single waiting thread"
        );
        fence(Ordering::SeqCst);
    }

    fn try_wake(&self) -> Option<Wake> {
        if self.is_shutdown_requested() {
            return Some(Wake::Shutdown);
        }
        self.permits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |permits| {
                permits.checked_sub(1)
            })
            .ok()
            .map(|_| Wake::Data)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn posts_before_wait_are_counted() {
        let signal = WakeSignal::new();
        signal.post();
        signal.post_from_isr();
        assert_eq!(signal.pending(), 2);

        assert_eq!(signal.wait(), Wake::Data);
        assert_eq!(signal.wait(), Wake::Data);
        assert_eq!(signal.pending(), 0);
    }

    #[test]
    fn wait_timeout_expires_without_permits() {
        let signal = WakeSignal::new();
        assert_eq!(signal.wait_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn post_from_other_thread_wakes_waiter() {
        let signal = Arc::new(WakeSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait())
        };

        thread::sleep(Duration::from_millis(20));
        signal.post_from_isr();

        assert_eq!(waiter.join().unwrap(), Wake::Data);
    }

    #[test]
    fn shutdown_wakes_blocked_waiter() {
        let signal = Arc::new(WakeSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait())
        };

        thread::sleep(Duration::from_millis(20));
        signal.request_shutdown();

        assert_eq!(waiter.join().unwrap(), Wake::Shutdown);
    }

    #[test]
    fn shutdown_takes_precedence_over_permits() {
        let signal = WakeSignal::new();
        signal.post();
        signal.request_shutdown();

        assert_eq!(signal.wait(), Wake::Shutdown);
        assert_eq!(signal.pending(), 1);
    }

    #[test]
    fn many_posters_deliver_every_permit() {
        let signal = Arc::new(WakeSignal::new());
        let posters: Vec<_> = (0..4)
            .map(|_| {
                let signal = Arc::clone(&signal);
                thread::spawn(move || {
                    for _ in 0..250 {
                        signal.post_from_isr();
                    }
                })
            })
            .collect();

        let mut received = 0;
        while received < 1000 {
            if signal.wait_timeout(Duration::from_secs(5)) == Some(Wake::Data) {
                received += 1;
            } else {
                panic!("permit lost after {received}");
            }
        }
        for poster in posters {
            poster.join().unwrap();
        }
        assert_eq!(signal.pending(), 0);
    }
}
