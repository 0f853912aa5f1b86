use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time view of a client's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    /// Frames accepted into the queue.
    pub frames_enqueued: u64,
    /// Frames dropped because the queue could not fit them.
    pub frames_dropped_queue_full: u64,
    /// Frames dropped because the topic's pack buffer was already in use.
    pub frames_dropped_slot_busy: u64,
    /// Frames dropped because the payload exceeded the pack buffer.
    pub frames_dropped_oversize: u64,
    /// Bytes handed to the transport successfully.
    pub bytes_written: u64,
    /// Transport writes that failed (their bytes are lost).
    pub write_failures: u64,
    /// Times the transmitter woke up with a data permit.
    pub wakeups: u64,
}

impl ClientStats {
    /// All dropped frames regardless of cause.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped_queue_full + self.frames_dropped_slot_busy + self.frames_dropped_oversize
    }
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) frames_enqueued: AtomicU64,
    pub(crate) frames_dropped_queue_full: AtomicU64,
    pub(crate) frames_dropped_slot_busy: AtomicU64,
    pub(crate) frames_dropped_oversize: AtomicU64,
    pub(crate) bytes_written: AtomicU64,
    pub(crate) write_failures: AtomicU64,
    pub(crate) wakeups: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ClientStats {
        ClientStats {
            frames_enqueued: self.frames_enqueued.load(Ordering::Relaxed),
            frames_dropped_queue_full: self.frames_dropped_queue_full.load(Ordering::Relaxed),
            frames_dropped_slot_busy: self.frames_dropped_slot_busy.load(Ordering::Relaxed),
            frames_dropped_oversize: self.frames_dropped_oversize.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
        }
    }
}
