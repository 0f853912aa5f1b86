use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{Result, TransportError};
use crate::traits::{Transport, WriteMode};

#[derive(Default)]
struct Capture {
    bytes: Vec<u8>,
    writes: usize,
    pending_failures: usize,
}

/// In-memory transport that records every byte written to it.
///
/// Clones share the same capture, so a test keeps one handle for inspection
/// while the transmitter owns another.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    shared: Arc<(Mutex<Capture>, Condvar)>,
}

impl MemoryTransport {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every byte written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().bytes.clone()
    }

    /// Number of successful `write` calls.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Make the next `count` writes fail with an I/O error.
    pub fn fail_next_writes(&self, count: usize) {
        self.lock().pending_failures = count;
    }

    /// Block until at least `len` bytes have been captured or `timeout` elapses.
    ///
    /// Returns whether the length was reached.
    pub fn wait_for_len(&self, len: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.shared;
        let mut capture = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while capture.bytes.len() < len {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            capture = match cvar.wait_timeout(capture, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, Capture> {
        self.shared
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for MemoryTransport {
    fn write(&mut self, bytes: &[u8], _mode: WriteMode) -> Result<()> {
        let mut capture = self.lock();
        if capture.pending_failures > 0 {
            capture.pending_failures -= 1;
            return Err(TransportError::Io(std::io::Error::other(
                "injected write failure",
            )));
        }
        capture.bytes.extend_from_slice(bytes);
        capture.writes += 1;
        drop(capture);
        self.shared.1.notify_all();
        Ok(())
    }

    fn transport_name(&self) -> &str {
        "memory"
    }
}
