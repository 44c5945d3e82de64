//! Size-tracking prefix for backends without a native size query.
//!
//! A word-sized header immediately before the user-visible pointer stores
//! the requested logical size, recoverable bit-for-bit for the lifetime of
//! the block. All pointer-to-header and header-to-pointer arithmetic lives
//! in this module; no other code offsets raw pointers.
//!
//! Mutually exclusive with a backend's native size query: a build uses one
//! mechanism or the other, never both.

use std::ptr::NonNull;

/// Bytes reserved in front of every allocation for the stored size.
pub const PREFIX_SIZE: usize = std::mem::size_of::<usize>();

/// Writes `logical` into the prefix at `raw` and returns the user pointer
/// just past it.
///
/// # Safety
///
/// `raw` must point to at least `PREFIX_SIZE + logical` writable bytes and
/// be word-aligned (every supported backend returns word-aligned blocks).
pub(crate) unsafe fn stamp(raw: NonNull<u8>, logical: usize) -> NonNull<u8> {
    // SAFETY: caller guarantees PREFIX_SIZE writable bytes at raw and word
    // alignment for the usize store.
    unsafe {
        raw.cast::<usize>().write(logical);
        raw.add(PREFIX_SIZE)
    }
}

/// Recovers the raw base pointer of a block from its user pointer.
///
/// # Safety
///
/// `user` must have been produced by [`stamp`].
pub(crate) unsafe fn raw_of(user: *mut u8) -> *mut u8 {
    // SAFETY: stamp placed the user pointer exactly PREFIX_SIZE past the base.
    unsafe { user.sub(PREFIX_SIZE) }
}

/// Reads the stored logical size of a live block.
///
/// # Safety
///
/// `user` must have been produced by [`stamp`] and the block must still be
/// live.
pub(crate) unsafe fn logical_size(user: *mut u8) -> usize {
    // SAFETY: the prefix sits PREFIX_SIZE before user and outlives the block.
    unsafe { raw_of(user).cast::<usize>().read() }
}
