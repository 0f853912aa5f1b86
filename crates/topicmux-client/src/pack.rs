//! Fixed arena of per-topic pack buffers addressed by slot index.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

struct PackSlot {
    size: usize,
    buffer: UnsafeCell<Box<[u8]>>,
    claimed: AtomicBool,
}

/// One independently owned buffer per topic, created once and never resized.
///
/// Each slot is written only by its own topic's callback. A claim flag turns
/// an unexpected concurrent publish of the same topic into a refused claim
/// instead of a data race.
pub struct PackArena {
    slots: Box<[PackSlot]>,
}

// SAFETY: a slot's buffer is only reachable through a `PackGuard`, and at most
// one guard per slot exists at a time (enforced by `claimed`).
unsafe impl Sync for PackArena {}

impl PackArena {
    /// Allocate one zeroed buffer per entry of `sizes`.
    pub fn new(sizes: impl IntoIterator<Item = usize>) -> Self {
        let slots = sizes
            .into_iter()
            .map(|size| PackSlot {
                size,
                buffer: UnsafeCell::new(vec![0u8; size].into_boxed_slice()),
                claimed: AtomicBool::new(false),
            })
            .collect();
        Self { slots }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Size in bytes of the buffer at `slot`.
    pub fn slot_size(&self, slot: usize) -> Option<usize> {
        self.slots.get(slot).map(|entry| entry.size)
    }

    /// Take exclusive access to `slot`'s buffer.
    ///
    /// Returns `None` if the slot does not exist or is already claimed. Never
    /// blocks.
    pub fn try_claim(&self, slot: usize) -> Option<PackGuard<'_>> {
        let entry = self.slots.get(slot)?;
        entry
            .claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        Some(PackGuard { slot: entry })
    }
}

/// Exclusive access to one pack buffer; released on drop.
pub struct PackGuard<'a> {
    slot: &'a PackSlot,
}

impl Deref for PackGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: this guard holds the slot's claim.
        unsafe { &*self.slot.buffer.get() }
    }
}

impl DerefMut for PackGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: this guard holds the slot's claim.
        unsafe { &mut *self.slot.buffer.get() }
    }
}

impl Drop for PackGuard<'_> {
    fn drop(&mut self) {
        self.slot.claimed.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_have_requested_sizes() {
        let arena = PackArena::new([12, 16]);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.slot_size(0), Some(12));
        assert_eq!(arena.slot_size(1), Some(16));
        assert_eq!(arena.slot_size(2), None);
    }

    #[test]
    fn claim_is_exclusive_until_dropped() {
        let arena = PackArena::new([4]);
        let mut guard = arena.try_claim(0).unwrap();
        guard.copy_from_slice(&[1, 2, 3, 4]);
        assert!(arena.try_claim(0).is_none());

        drop(guard);
        let guard = arena.try_claim(0).unwrap();
        assert_eq!(&*guard, &[1, 2, 3, 4]);
    }

    #[test]
    fn slots_are_independent() {
        let arena = PackArena::new([2, 2]);
        let mut first = arena.try_claim(0).unwrap();
        let mut second = arena.try_claim(1).unwrap();
        first.fill(0xAA);
        second.fill(0xBB);

        assert_eq!(&*first, &[0xAA, 0xAA]);
        assert_eq!(&*second, &[0xBB, 0xBB]);
    }

    #[test]
    fn unknown_slot_is_refused() {
        let arena = PackArena::new([1]);
        assert!(arena.try_claim(5).is_none());
    }
}
