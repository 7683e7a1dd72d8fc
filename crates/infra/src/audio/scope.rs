//! Lock-free scope buffer for waveform visualization
//!
//! The audio thread pushes one sample at a time; a render thread takes
//! snapshots whenever it repaints. The producer never waits on the consumer:
//! when the buffer is full the oldest sample is overwritten.
//!
//! Performance characteristics:
//! - Lock-free, wait-free push (one relaxed store, one release store)
//! - No allocations in the push path
//! - Cache-padded write counter to prevent false sharing
//!
//! A snapshot taken while the producer is running may mix samples from two
//! consecutive laps around the ring. Only "recent samples eventually
//! visible" is guaranteed.

use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Single-producer single-consumer overwrite-oldest circular buffer
pub struct ScopeBuffer {
    /// Sample storage as `f32` bit patterns
    slots: Box<[AtomicU32]>,

    /// Total samples ever pushed (cache-padded to prevent false sharing)
    written: CachePadded<AtomicUsize>,

    /// Mask for fast modulo operation (capacity - 1)
    mask: usize,
}

impl ScopeBuffer {
    /// Create a new scope buffer
    ///
    /// Capacity will be rounded up to the next power of 2 (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();

        Self {
            slots: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            written: CachePadded::new(AtomicUsize::new(0)),
            mask: capacity - 1,
        }
    }

    /// Append one sample, overwriting the oldest when full (producer)
    #[inline]
    pub fn push_sample(&self, x: f32) {
        let pos = self.written.load(Ordering::Relaxed);
        self.slots[pos & self.mask].store(x.to_bits(), Ordering::Relaxed);

        // Release publishes the slot write together with the new count
        self.written.store(pos.wrapping_add(1), Ordering::Release);
    }

    /// Copy the most recent samples into `out`, oldest first (consumer)
    ///
    /// Returns the number of samples copied: the smaller of `out.len()` and
    /// the current fill level.
    pub fn copy_snapshot(&self, out: &mut [f32]) -> usize {
        let written = self.written.load(Ordering::Acquire);
        let count = out.len().min(written).min(self.capacity());
        let start = written.wrapping_sub(count);

        for (i, sample) in out[..count].iter_mut().enumerate() {
            let pos = start.wrapping_add(i) & self.mask;
            *sample = f32::from_bits(self.slots[pos].load(Ordering::Relaxed));
        }

        count
    }

    /// Current contents, oldest first
    pub fn snapshot(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.len()];
        let count = self.copy_snapshot(&mut out);
        out.truncate(count);
        out
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.written.load(Ordering::Acquire).min(self.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.written.load(Ordering::Acquire) == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Forget all samples
    ///
    /// Only call while the producer is idle.
    pub fn clear(&self) {
        self.written.store(0, Ordering::Release);
    }
}

impl std::fmt::Debug for ScopeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
