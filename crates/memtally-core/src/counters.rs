//! Thread-safe running totals of bytes in use.
//!
//! Deltas are rounded up to the platform word size before being applied, so
//! the totals reflect allocator-padded size rather than the raw requested
//! size. The counters are an injectable context owned by the composing
//! [`TrackedHeap`](crate::TrackedHeap), not a file-scope singleton, so
//! isolated instances can exist side by side in tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::placement::Placement;

/// Platform word size used as the minimum accounting granularity.
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// Rounds `n` up to the next multiple of the platform word size.
#[must_use]
pub fn pad_to_word(n: usize) -> usize {
    n.div_ceil(WORD_SIZE) * WORD_SIZE
}

/// One atomic byte total.
#[derive(Debug, Default)]
struct Counter(AtomicUsize);

impl Counter {
    fn add(&self, padded: usize) {
        self.0.fetch_add(padded, Ordering::Relaxed);
    }

    fn sub(&self, padded: usize) {
        let prev = self.0.fetch_sub(padded, Ordering::Relaxed);
        // Decrementing more than was incremented has no defined recovery; it
        // is a programming error in the caller, not a runtime condition.
        debug_assert!(prev >= padded, "usage counter underflow: {prev} - {padded}");
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Independent DRAM and persistent-memory byte totals.
///
/// Increment and decrement are atomic with respect to concurrent callers
/// from any thread; no external lock is required. Readers get a best-effort
/// instantaneous snapshot with no ordering guarantee relative to concurrent
/// writers beyond the atomicity of the read itself.
#[derive(Debug, Default)]
pub struct UsageCounters {
    dram: Counter,
    pmem: Counter,
}

impl UsageCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `n` freshly allocated bytes against the pool's total.
    pub fn increment(&self, placement: Placement, n: usize) {
        self.pool(placement).add(pad_to_word(n));
    }

    /// Removes `n` freed bytes from the pool's total.
    pub fn decrement(&self, placement: Placement, n: usize) {
        self.pool(placement).sub(pad_to_word(n));
    }

    /// Current DRAM bytes in use.
    #[must_use]
    pub fn dram_bytes(&self) -> usize {
        self.dram.get()
    }

    /// Current persistent-memory bytes in use.
    #[must_use]
    pub fn pmem_bytes(&self) -> usize {
        self.pmem.get()
    }

    fn pool(&self, placement: Placement) -> &Counter {
        match placement {
            Placement::Dram => &self.dram,
            Placement::Pmem => &self.pmem,
        }
    }
}
