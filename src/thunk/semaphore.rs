use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// CPU-visible completion semaphore of a queue.
///
/// The GPU writes `sequence` when work completes. Layout matches the
/// semaphore release payload.
#[repr(C, align(16))]
#[derive(Debug, Default)]
pub struct Semaphore {
    pub sequence: AtomicU32,
    pub reserved: u32,
    pub timestamp: AtomicU64,
}

const _: () = assert!(std::mem::size_of::<Semaphore>() == 16);

impl Semaphore {
    /// Returns true once `sequence` has caught up with `value`, tolerating wrap-around.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn is_reached(&self, value: u32) -> bool {
        self.sequence.load(Ordering::Acquire).wrapping_sub(value) as i32 >= 0
    }
}

/// A point in a queue's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence {
    pub queue_id: u32,
    pub value: u32,
}

/// Per-queue semaphore slots and the sequence numbers scheduled on them.
#[derive(Debug)]
pub(crate) struct SemaphoreTable {
    slots: Box<[Semaphore]>,
    values: Box<[AtomicU32]>,
}

impl SemaphoreTable {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            slots: (0..count).map(|_| Semaphore::default()).collect(),
            values: (0..count).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub(crate) fn cpu(&self, id: u32) -> &Semaphore {
        &self.slots[id as usize]
    }

    pub(crate) fn value(&self, id: u32) -> u32 {
        self.values[id as usize].load(Ordering::Acquire)
    }

    /// Allocates the next sequence number for `id`.
    pub(crate) fn next_value(&self, id: u32) -> u32 {
        self.values[id as usize]
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1)
    }

    /// Resets a slot for a newly registered queue.
    pub(crate) fn reset(&self, id: u32) {
        let value = self.value(id);
        self.slots[id as usize].sequence.store(value, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reached_handles_wraparound() {
        let sem = Semaphore::default();
        sem.sequence.store(u32::MAX, Ordering::Relaxed);
        assert!(sem.is_reached(u32::MAX - 1));
        assert!(!sem.is_reached(0));

        sem.sequence.store(1, Ordering::Relaxed);
        assert!(sem.is_reached(u32::MAX));
        assert!(!sem.is_reached(2));
    }

    #[test]
    fn next_value_advances_schedule() {
        let table = SemaphoreTable::new(2);
        assert_eq!(table.next_value(1), 1);
        assert_eq!(table.next_value(1), 2);
        assert_eq!(table.value(1), 2);
        assert_eq!(table.value(0), 0);
        assert!(!table.cpu(1).is_reached(2));
        table.reset(1);
        assert!(table.cpu(1).is_reached(2));
    }
}
