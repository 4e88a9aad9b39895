//! Mailbox message queue
//!
//! Fixed-capacity ring of words received from the mailbox. The interrupt
//! handler is the only producer and the dispatch loop the only consumer,
//! so the indices need no locking, only ordered loads and stores.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use static_assertions::const_assert;

use crate::config::MESSAGE_QUEUE_DEPTH;

const_assert!(MESSAGE_QUEUE_DEPTH.is_power_of_two());

/// One word received on one mailbox channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Envelope {
    pub channel: u8,
    pub word: u32,
}

/// Single-producer single-consumer ring of [`Envelope`]s.
///
/// `N` must be a power of two. Indices run freely and wrap; the slot is
/// `index & (N - 1)`, so all `N` slots are usable.
pub struct MessageQueue<const N: usize> {
    slots: UnsafeCell<[Envelope; N]>,
    /// Incremented by enqueue
    write_index: AtomicUsize,
    /// Incremented by dequeue
    read_index: AtomicUsize,
}

// SAFETY: a slot is written only by the producer while it lies outside
// `read..write`, and read only by the consumer while inside it. The index
// stores publish the slot contents with release ordering.
unsafe impl<const N: usize> Sync for MessageQueue<N> {}

impl<const N: usize> MessageQueue<N> {
    const MASK: usize = N - 1;

    pub const fn new() -> Self {
        MessageQueue {
            slots: UnsafeCell::new([Envelope { channel: 0, word: 0 }; N]),
            write_index: AtomicUsize::new(0),
            read_index: AtomicUsize::new(0),
        }
    }

    /// Append an envelope. Gives it back if the queue is full.
    pub fn enqueue(&self, envelope: Envelope) -> Result<(), Envelope> {
        let write = self.write_index.load(Ordering::Relaxed);
        let read = self.read_index.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= N {
            return Err(envelope);
        }

        // SAFETY: the slot is outside `read..write`, so the consumer is not
        // looking at it.
        unsafe {
            (*self.slots.get())[write & Self::MASK] = envelope;
        }

        self.write_index
            .store(write.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Remove the oldest envelope, if any.
    pub fn dequeue(&self) -> Option<Envelope> {
        let read = self.read_index.load(Ordering::Relaxed);
        let write = self.write_index.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        // SAFETY: the slot is inside `read..write`, so the producer has
        // finished writing it and will not touch it until we advance.
        let envelope = unsafe { (*self.slots.get())[read & Self::MASK] };

        self.read_index
            .store(read.wrapping_add(1), Ordering::Release);
        Some(envelope)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current queue depth (a snapshot)
    pub fn len(&self) -> usize {
        let write = self.write_index.load(Ordering::Acquire);
        let read = self.read_index.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }
}

impl<const N: usize> Default for MessageQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
