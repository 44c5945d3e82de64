//! Backend capability surface and build-time selection.
//!
//! Exactly one backend is active per build, chosen by cargo feature; there
//! is no runtime switching. The [`DefaultBackend`] alias resolves to the
//! enabled feature's heap, falling back to the platform allocator.

mod system;

pub use system::SystemHeap;

#[cfg(feature = "jemalloc")]
mod jemalloc;
#[cfg(feature = "jemalloc")]
pub use jemalloc::JemallocHeap;

#[cfg(feature = "mimalloc")]
mod mimalloc;
#[cfg(feature = "mimalloc")]
pub use mimalloc::MimallocHeap;

#[cfg(all(feature = "jemalloc", feature = "mimalloc"))]
compile_error!("features `jemalloc` and `mimalloc` select conflicting backends; enable at most one");

/// Backend active for this build.
#[cfg(feature = "jemalloc")]
pub type DefaultBackend = JemallocHeap;

/// Backend active for this build.
#[cfg(all(feature = "mimalloc", not(feature = "jemalloc")))]
pub type DefaultBackend = MimallocHeap;

/// Backend active for this build.
#[cfg(not(any(feature = "jemalloc", feature = "mimalloc")))]
pub type DefaultBackend = SystemHeap;

use crate::oom;
use crate::placement::Placement;

/// Allocator-native statistics snapshot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Bytes in live allocations, as the backend counts them.
    pub allocated: u64,
    /// Bytes in active pages; excludes pages the allocator reserves for
    /// reuse (a purge cleans those).
    pub active: u64,
    /// Resident bytes attributed to the allocator's own mappings; unlike
    /// process RSS this excludes shared libraries and other non-heap maps.
    pub resident: u64,
}

/// Primitive operations of one heap backend.
///
/// The wrapper maps every public operation onto these; implementations
/// delegate to exactly one underlying allocator. Methods with default
/// bodies describe capabilities most backends lack: persistent-memory
/// pools, thread-cache bypass, native statistics, and purge control.
pub trait AllocBackend: Send + Sync {
    /// Whether the backend can report the allocated size of a live pointer.
    ///
    /// When true, the size-tracking header is bypassed for the whole build;
    /// the two mechanisms are never combined.
    const NATIVE_SIZE: bool;

    /// Allocates `size` uninitialized bytes; null on failure.
    fn raw_alloc(&self, size: usize) -> *mut u8;

    /// Allocates `size` zeroed bytes; null on failure.
    fn raw_zero_alloc(&self, size: usize) -> *mut u8;

    /// Resizes a block to `size` bytes; null on failure, in which case the
    /// old block remains valid.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live base pointer previously returned by this
    /// backend's DRAM pool.
    unsafe fn raw_resize(&self, ptr: *mut u8, size: usize) -> *mut u8;

    /// Releases a block to the DRAM pool.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live base pointer previously returned by this
    /// backend's DRAM pool, not freed since.
    unsafe fn raw_free(&self, ptr: *mut u8);

    /// Allocator-reported usable size of a live pointer.
    ///
    /// Only called when [`Self::NATIVE_SIZE`] is true.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live base pointer from this backend.
    unsafe fn allocated_size(&self, ptr: *mut u8) -> usize {
        let _ = ptr;
        unreachable!("backend reports no native allocation size")
    }

    /// Like [`Self::raw_alloc`] but skipping any per-thread caching layer,
    /// straight to the global arena.
    fn raw_alloc_uncached(&self, size: usize) -> *mut u8 {
        self.raw_alloc(size)
    }

    /// Like [`Self::raw_free`] but skipping any per-thread caching layer.
    ///
    /// # Safety
    ///
    /// As [`Self::raw_free`].
    unsafe fn raw_free_uncached(&self, ptr: *mut u8) {
        // SAFETY: forwarded caller contract.
        unsafe { self.raw_free(ptr) }
    }

    /// Whether this backend manages a persistent-memory pool.
    fn supports_pmem(&self) -> bool {
        false
    }

    /// Which pool owns `ptr`.
    ///
    /// An active query against pool metadata when the backend supports
    /// persistent memory; the constant function `Dram` otherwise. Derived
    /// from the pointer itself, never from caller-supplied context.
    ///
    /// # Safety
    ///
    /// `ptr` must point into a live allocation from this backend.
    unsafe fn classify(&self, ptr: *mut u8) -> Placement {
        let _ = ptr;
        Placement::Dram
    }

    /// Allocates from the persistent pool; fatal on backends without one.
    fn raw_alloc_pmem(&self, size: usize) -> *mut u8 {
        let _ = size;
        oom::pmem_unavailable()
    }

    /// Resizes within the persistent pool; fatal on backends without one.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live base pointer from this backend's persistent pool.
    unsafe fn raw_resize_pmem(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        let _ = (ptr, size);
        oom::pmem_unavailable()
    }

    /// Releases to the persistent pool; fatal on backends without one.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live base pointer from this backend's persistent pool.
    unsafe fn raw_free_pmem(&self, ptr: *mut u8) {
        let _ = ptr;
        oom::pmem_unavailable()
    }

    /// Native statistics snapshot, epoch-refreshed; `None` when the backend
    /// exposes no introspection API.
    fn native_stats(&self) -> Option<AllocatorStats> {
        None
    }

    /// Enables or disables asynchronous page reclamation. Returns whether
    /// the backend honored the request.
    fn set_background_purge(&self, enabled: bool) -> bool {
        let _ = enabled;
        false
    }

    /// Synchronously returns unused pages to the OS. Returns whether a
    /// purge happened.
    fn purge_unused_pages(&self) -> bool {
        false
    }
}
