//! Placement classification for live pointers.

/// Which pool a block resides in.
///
/// Derived on demand from a pointer by asking the backend which pool owns
/// the address, never stored alongside the block and never supplied by the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Ordinary volatile memory.
    Dram,
    /// Persistent / non-volatile memory pool.
    Pmem,
}

impl Placement {
    /// True for the persistent pool.
    #[must_use]
    pub const fn is_pmem(self) -> bool {
        matches!(self, Self::Pmem)
    }
}
