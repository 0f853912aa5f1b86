//! Bounded multi-producer / single-consumer byte queue.
//!
//! Producers reserve a contiguous region with a CAS on a packed
//! `(reserved, committed)` cursor pair, copy their batch in, then add their
//! length to `committed`. The producer whose commit makes `committed` catch up
//! with `reserved` publishes that point as the new readable end, so the
//! consumer only ever sees bytes from fully written batches. A batch either
//! fits entirely or the push fails without touching any state.
//!
//! Cursors are wrapping `u32` byte counters. Storage is rounded up to a power
//! of two so masked indices stay valid across the wrap; the logical capacity
//! used for the fullness check is exactly what was requested.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Largest supported queue capacity in bytes.
pub const MAX_QUEUE_CAPACITY: usize = 1 << 30;

/// Errors raised when building a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("invalid queue capacity {capacity} (must be 1..={max})")]
    InvalidCapacity { capacity: usize, max: usize },
}

/// A push that did not fit. The queue is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("queue full ({requested} bytes requested, {available} free)")]
pub struct QueueFull {
    pub requested: usize,
    pub available: usize,
}

struct Ring {
    storage: Box<[UnsafeCell<u8>]>,
    mask: u32,
    capacity: u32,
    /// High 32 bits: reserved end. Low 32 bits: committed byte count.
    cursors: AtomicU64,
    /// End of the longest prefix whose bytes are all written.
    published: AtomicU32,
    /// Consumer read position.
    head: AtomicU32,
}

// SAFETY: producers only write inside regions they reserved through the
// cursor CAS, and the consumer only reads below `published`, which never
// covers a region still being written. Reserved regions never overlap
// because `reserved - head` is kept at or below `capacity`.
unsafe impl Sync for Ring {}

fn split(cursors: u64) -> (u32, u32) {
    ((cursors >> 32) as u32, cursors as u32)
}

fn join(reserved: u32, committed: u32) -> u64 {
    (u64::from(reserved) << 32) | u64::from(committed)
}

impl Ring {
    fn base(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.storage.as_ptr())
    }

    fn readable(&self) -> usize {
        // Head first: it never passes `published`, so the difference stays sane.
        let head = self.head.load(Ordering::Acquire);
        let published = self.published.load(Ordering::Acquire);
        published.wrapping_sub(head) as usize
    }

    fn reserve(&self, len: u32) -> Result<u32, QueueFull> {
        loop {
            let head = self.head.load(Ordering::Acquire);
            let current = self.cursors.load(Ordering::Acquire);
            let (reserved, committed) = split(current);
            let used = reserved.wrapping_sub(head);
            if used > self.capacity {
                // The consumer moved between the two loads; take a fresh view.
                continue;
            }
            let available = self.capacity - used;
            if len > available {
                return Err(QueueFull {
                    requested: len as usize,
                    available: available as usize,
                });
            }
            let next = join(reserved.wrapping_add(len), committed);
            if self
                .cursors
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(reserved);
            }
        }
    }

    fn commit(&self, len: u32) {
        let mut current = self.cursors.load(Ordering::Acquire);
        loop {
            let (reserved, committed) = split(current);
            let committed = committed.wrapping_add(len);
            match self.cursors.compare_exchange_weak(
                current,
                join(reserved, committed),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if committed == reserved {
                        self.publish(reserved);
                    }
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn publish(&self, end: u32) {
        let mut current = self.published.load(Ordering::Acquire);
        // A late publisher may carry an end that was already overtaken.
        while (end.wrapping_sub(current) as i32) > 0 {
            match self.published.compare_exchange_weak(
                current,
                end,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn write_at(&self, start: u32, bytes: &[u8]) {
        let offset = (start & self.mask) as usize;
        let first = bytes.len().min(self.storage.len() - offset);
        // SAFETY: `[start, start + len)` was reserved by this producer alone;
        // both copies stay inside `storage`.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.base().add(offset), first);
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr().add(first),
                self.base(),
                bytes.len() - first,
            );
        }
    }

    fn read_at(&self, start: u32, dst: &mut [u8]) {
        let offset = (start & self.mask) as usize;
        let first = dst.len().min(self.storage.len() - offset);
        // SAFETY: the range lies below `published`, so every byte is fully
        // written and no producer may reuse it until `head` moves past it.
        unsafe {
            std::ptr::copy_nonoverlapping(self.base().add(offset), dst.as_mut_ptr(), first);
            std::ptr::copy_nonoverlapping(
                self.base(),
                dst.as_mut_ptr().add(first),
                dst.len() - first,
            );
        }
    }
}

/// Constructor for the writer/reader pair sharing one ring.
pub struct FrameQueue;

impl FrameQueue {
    /// Allocate a queue holding up to `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<(QueueWriter, QueueReader), QueueError> {
        if capacity == 0 || capacity > MAX_QUEUE_CAPACITY {
            return Err(QueueError::InvalidCapacity {
                capacity,
                max: MAX_QUEUE_CAPACITY,
            });
        }
        let storage_len = capacity.next_power_of_two();
        let storage: Box<[UnsafeCell<u8>]> =
            (0..storage_len).map(|_| UnsafeCell::new(0)).collect();
        let ring = Arc::new(Ring {
            storage,
            mask: (storage_len - 1) as u32,
            capacity: capacity as u32,
            cursors: AtomicU64::new(0),
            published: AtomicU32::new(0),
            head: AtomicU32::new(0),
        });
        Ok((
            QueueWriter {
                ring: Arc::clone(&ring),
            },
            QueueReader { ring },
        ))
    }
}

/// Producer side. Cloneable; any number of contexts may push concurrently.
#[derive(Clone)]
pub struct QueueWriter {
    ring: Arc<Ring>,
}

impl QueueWriter {
    /// Append `bytes` as one indivisible batch.
    ///
    /// Never blocks and never allocates. Fails without side effects when the
    /// whole batch does not fit.
    pub fn push_batch(&self, bytes: &[u8]) -> Result<(), QueueFull> {
        if bytes.is_empty() {
            return Ok(());
        }
        let capacity = self.ring.capacity as usize;
        if bytes.len() > capacity {
            return Err(QueueFull {
                requested: bytes.len(),
                available: capacity - self.ring.readable().min(capacity),
            });
        }
        let len = bytes.len() as u32;
        let start = self.ring.reserve(len)?;
        self.ring.write_at(start, bytes);
        self.ring.commit(len);
        Ok(())
    }

    /// Bytes currently readable by the consumer.
    pub fn len(&self) -> usize {
        self.ring.readable()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity as usize
    }
}

/// Consumer side. Exactly one exists per queue.
pub struct QueueReader {
    ring: Arc<Ring>,
}

impl QueueReader {
    /// Move up to `dst.len()` readable bytes into `dst`, returning the count.
    ///
    /// Returns 0 when nothing is readable.
    pub fn pop_batch(&mut self, dst: &mut [u8]) -> usize {
        let head = self.ring.head.load(Ordering::Relaxed);
        let published = self.ring.published.load(Ordering::Acquire);
        let n = (published.wrapping_sub(head) as usize).min(dst.len());
        if n == 0 {
            return 0;
        }
        self.ring.read_at(head, &mut dst[..n]);
        self.ring
            .head
            .store(head.wrapping_add(n as u32), Ordering::Release);
        n
    }

    /// Bytes currently readable.
    pub fn len(&self) -> usize {
        self.ring.readable()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop() {
        let (writer, mut reader) = FrameQueue::with_capacity(16).unwrap();
        writer.push_batch(b"abc").unwrap();
        writer.push_batch(b"de").unwrap();
        assert_eq!(reader.len(), 5);

        let mut out = [0u8; 16];
        let n = reader.pop_batch(&mut out);
        assert_eq!(&out[..n], b"abcde");
        assert!(reader.is_empty());
    }

    #[test]
    fn second_pop_without_push_returns_zero() {
        let (writer, mut reader) = FrameQueue::with_capacity(8).unwrap();
        writer.push_batch(b"xy").unwrap();

        let mut out = [0u8; 8];
        assert_eq!(reader.pop_batch(&mut out), 2);
        assert_eq!(reader.pop_batch(&mut out), 0);
    }

    #[test]
    fn pop_respects_destination_length() {
        let (writer, mut reader) = FrameQueue::with_capacity(8).unwrap();
        writer.push_batch(b"abcdef").unwrap();

        let mut out = [0u8; 4];
        assert_eq!(reader.pop_batch(&mut out), 4);
        assert_eq!(&out, b"abcd");
        assert_eq!(reader.pop_batch(&mut out), 2);
        assert_eq!(&out[..2], b"ef");
    }

    #[test]
    fn oversized_batch_fails_without_side_effects() {
        let (writer, mut reader) = FrameQueue::with_capacity(4).unwrap();
        let err = writer.push_batch(b"too long").unwrap_err();
        assert_eq!(
            err,
            QueueFull {
                requested: 8,
                available: 4
            }
        );

        let mut out = [0u8; 8];
        assert_eq!(reader.pop_batch(&mut out), 0);
        writer.push_batch(b"ok").unwrap();
        assert_eq!(reader.pop_batch(&mut out), 2);
    }

    #[test]
    fn full_queue_rejects_whole_batch() {
        let (writer, mut reader) = FrameQueue::with_capacity(6).unwrap();
        writer.push_batch(b"1234").unwrap();

        let err = writer.push_batch(b"567").unwrap_err();
        assert_eq!(err.available, 2);
        assert_eq!(reader.len(), 4);

        let mut out = [0u8; 8];
        let n = reader.pop_batch(&mut out);
        assert_eq!(&out[..n], b"1234");
    }

    #[test]
    fn wraps_around_storage() {
        // Capacity 6 rounds storage up to 8, so batches straddle the end.
        let (writer, mut reader) = FrameQueue::with_capacity(6).unwrap();
        let mut out = [0u8; 6];
        let mut expected = Vec::new();
        let mut received = Vec::new();

        for round in 0u8..20 {
            let batch = [round, round.wrapping_add(1), round.wrapping_add(2), round ^ 0xFF];
            writer.push_batch(&batch).unwrap();
            expected.extend_from_slice(&batch);
            let n = reader.pop_batch(&mut out);
            received.extend_from_slice(&out[..n]);
        }

        assert_eq!(received, expected);
    }

    #[test]
    fn empty_push_is_noop() {
        let (writer, reader) = FrameQueue::with_capacity(4).unwrap();
        writer.push_batch(&[]).unwrap();
        assert!(reader.is_empty());
    }

    #[test]
    fn invalid_capacity_rejected() {
        assert!(matches!(
            FrameQueue::with_capacity(0),
            Err(QueueError::InvalidCapacity { capacity: 0, .. })
        ));
        assert!(FrameQueue::with_capacity(MAX_QUEUE_CAPACITY + 1).is_err());
    }

    #[test]
    fn cursor_packing() {
        assert_eq!(split(join(7, 3)), (7, 3));
        assert_eq!(split(join(u32::MAX, 0)), (u32::MAX, 0));
    }

    #[test]
    fn concurrent_producers_never_interleave_batches() {
        const PRODUCERS: u8 = 4;
        const PER_PRODUCER: usize = 2_000;
        const BATCH: usize = 5;

        let (writer, mut reader) = FrameQueue::with_capacity(64).unwrap();
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|id| {
                let writer = writer.clone();
                std::thread::spawn(move || {
                    let mut sent = 0usize;
                    while sent < PER_PRODUCER {
                        let batch = [id; BATCH];
                        if writer.push_batch(&batch).is_ok() {
                            sent += 1;
                        } else {
                            std::thread::yield_now();
                        }
                    }
                })
            })
            .collect();

        let total = PRODUCERS as usize * PER_PRODUCER * BATCH;
        let mut stream = Vec::with_capacity(total);
        let mut out = [0u8; 32];
        while stream.len() < total {
            let n = reader.pop_batch(&mut out);
            if n == 0 {
                std::thread::yield_now();
            }
            stream.extend_from_slice(&out[..n]);
        }
        for handle in handles {
            handle.join().unwrap();
        }

        for chunk in stream.chunks(BATCH) {
            assert!(chunk.iter().all(|b| *b == chunk[0]), "interleaved batch: {chunk:?}");
        }
        for id in 0..PRODUCERS {
            let count = stream.chunks(BATCH).filter(|c| c[0] == id).count();
            assert_eq!(count, PER_PRODUCER);
        }
    }
}
