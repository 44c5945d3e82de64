//! Public allocation API: callers only ever go through [`TrackedHeap`].
//!
//! Each operation performs the raw backend call, learns the block's
//! footprint (native size query or tracking header), updates the usage
//! counters, and routes resize/free through the placement classifier so a
//! block always returns to the pool it came from. Backend failure is routed
//! through the OOM handler and never surfaces as a null return.

use std::ffi::{CStr, c_char};
use std::ptr::{self, NonNull};

use parking_lot::RwLock;

use crate::backend::{AllocBackend, AllocatorStats, DefaultBackend};
use crate::counters::{UsageCounters, pad_to_word};
use crate::header;
use crate::oom::{AbortOnOom, OomHandler, pmem_unavailable};
use crate::placement::Placement;

/// Accounting allocator front end over one build-time backend.
///
/// All entry points take `&self` and are safe to call concurrently from any
/// thread with no caller-side locking; the counters are the only shared
/// mutable state on the hot path. No operation is cancellable and none has
/// a timeout: a stalled backend allocation blocks its caller, exactly as
/// the backend itself would.
pub struct TrackedHeap<B: AllocBackend> {
    backend: B,
    usage: UsageCounters,
    oom: RwLock<Box<dyn OomHandler>>,
}

impl Default for TrackedHeap<DefaultBackend> {
    fn default() -> Self {
        Self::new(DefaultBackend::default())
    }
}

impl<B: AllocBackend> TrackedHeap<B> {
    /// Creates a heap over `backend` with the abort-on-OOM default policy.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            usage: UsageCounters::new(),
            oom: RwLock::new(Box::new(AbortOnOom)),
        }
    }

    /// Replaces the out-of-memory policy.
    ///
    /// Expected to happen once, early, before concurrent allocation begins;
    /// racing an install against concurrent allocation is the caller's
    /// responsibility to serialize.
    pub fn set_oom_handler(&self, handler: Box<dyn OomHandler>) {
        *self.oom.write() = handler;
    }

    fn raise_oom(&self, requested: usize) -> ! {
        self.oom.read().handle_oom(requested)
    }

    // ------------------------------------------------------------------
    // allocation
    // ------------------------------------------------------------------

    /// Allocates `size` uninitialized bytes.
    ///
    /// On success the DRAM counter grows by the block's word-aligned
    /// footprint. If the backend cannot satisfy the request, the OOM
    /// handler is invoked exactly once with `size` and does not return.
    pub fn allocate(&self, size: usize) -> NonNull<u8> {
        match self.alloc_dram(size, false) {
            Some(ptr) => ptr,
            None => self.raise_oom(size),
        }
    }

    /// Allocates `size` bytes with every byte set to zero.
    pub fn zero_allocate(&self, size: usize) -> NonNull<u8> {
        match self.alloc_dram(size, true) {
            Some(ptr) => ptr,
            None => self.raise_oom(size),
        }
    }

    fn alloc_dram(&self, size: usize, zeroed: bool) -> Option<NonNull<u8>> {
        if B::NATIVE_SIZE {
            let raw = if zeroed {
                self.backend.raw_zero_alloc(size)
            } else {
                self.backend.raw_alloc(size)
            };
            let ptr = NonNull::new(raw)?;
            // SAFETY: freshly returned live pointer.
            self.usage
                .increment(Placement::Dram, unsafe { self.backend.allocated_size(raw) });
            Some(ptr)
        } else {
            let total = size.checked_add(header::PREFIX_SIZE)?;
            let raw = if zeroed {
                self.backend.raw_zero_alloc(total)
            } else {
                self.backend.raw_alloc(total)
            };
            let raw = NonNull::new(raw)?;
            // SAFETY: raw spans PREFIX_SIZE + size writable bytes.
            let user = unsafe { header::stamp(raw, size) };
            self.usage.increment(Placement::Dram, total);
            Some(user)
        }
    }

    /// Allocates `size` bytes from the persistent-memory pool.
    ///
    /// Aborts when the active backend has no persistent pool; placement is
    /// never silently downgraded to DRAM.
    pub fn allocate_pmem(&self, size: usize) -> NonNull<u8> {
        if !self.backend.supports_pmem() {
            pmem_unavailable();
        }
        match self.alloc_pmem(size) {
            Some(ptr) => ptr,
            None => self.raise_oom(size),
        }
    }

    fn alloc_pmem(&self, size: usize) -> Option<NonNull<u8>> {
        if B::NATIVE_SIZE {
            let raw = self.backend.raw_alloc_pmem(size);
            let ptr = NonNull::new(raw)?;
            // SAFETY: freshly returned live pointer.
            self.usage
                .increment(Placement::Pmem, unsafe { self.backend.allocated_size(raw) });
            Some(ptr)
        } else {
            let total = size.checked_add(header::PREFIX_SIZE)?;
            let raw = NonNull::new(self.backend.raw_alloc_pmem(total))?;
            // SAFETY: raw spans PREFIX_SIZE + size writable bytes.
            let user = unsafe { header::stamp(raw, size) };
            self.usage.increment(Placement::Pmem, total);
            Some(user)
        }
    }

    /// Copies `s`, including its NUL terminator, into a freshly allocated
    /// block of exactly `s.len() + 1` bytes.
    ///
    /// A convenience composition over [`Self::allocate`], not a primitive.
    pub fn duplicate_string(&self, s: &CStr) -> NonNull<c_char> {
        let bytes = s.to_bytes_with_nul();
        let dst = self.allocate(bytes.len());
        // SAFETY: dst spans bytes.len() writable bytes; source and
        // destination cannot overlap.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), dst.as_ptr(), bytes.len()) };
        dst.cast()
    }

    // ------------------------------------------------------------------
    // resize
    // ------------------------------------------------------------------

    /// Resizes a block to `new_size` bytes.
    ///
    /// A null `ptr` behaves as [`Self::allocate`]; `new_size == 0` with a
    /// non-null `ptr` behaves as [`Self::deallocate`] and returns null.
    /// Otherwise the pointer's pool is classified and the resize stays
    /// within it. After a move the old address is invalid and the return
    /// value is the sole live reference.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer previously returned by this
    /// heap.
    pub unsafe fn resize(&self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        if ptr.is_null() {
            return self.allocate(new_size).as_ptr();
        }
        if new_size == 0 {
            // SAFETY: non-null live pointer per caller contract.
            unsafe { self.deallocate(ptr) };
            return ptr::null_mut();
        }
        // SAFETY: live pointer per caller contract.
        let placement = unsafe { self.backend.classify(ptr) };
        unsafe { self.resize_in(ptr, new_size, placement) }
    }

    /// Resize constrained to the persistent pool.
    ///
    /// Aborts when the active backend has no persistent pool. Cross-pool
    /// migration is not supported; passing a DRAM pointer here is undefined.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer from [`Self::allocate_pmem`].
    pub unsafe fn resize_pmem(&self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        if !self.backend.supports_pmem() {
            pmem_unavailable();
        }
        if ptr.is_null() {
            return self.allocate_pmem(new_size).as_ptr();
        }
        if new_size == 0 {
            // SAFETY: non-null live pmem pointer per caller contract.
            unsafe { self.free_in(ptr, Placement::Pmem) };
            return ptr::null_mut();
        }
        // SAFETY: live pmem pointer per caller contract.
        unsafe { self.resize_in(ptr, new_size, Placement::Pmem) }
    }

    unsafe fn resize_in(&self, ptr: *mut u8, new_size: usize, placement: Placement) -> *mut u8 {
        // SAFETY: live pointer per caller contract.
        let old_footprint = unsafe { self.footprint(ptr) };
        if B::NATIVE_SIZE {
            let new_ptr = match placement {
                // SAFETY: ptr belongs to the classified pool.
                Placement::Dram => unsafe { self.backend.raw_resize(ptr, new_size) },
                Placement::Pmem => unsafe { self.backend.raw_resize_pmem(ptr, new_size) },
            };
            if new_ptr.is_null() {
                self.raise_oom(new_size);
            }
            self.usage.decrement(placement, old_footprint);
            // SAFETY: new_ptr is the live resized block.
            self.usage
                .increment(placement, unsafe { self.backend.allocated_size(new_ptr) });
            new_ptr
        } else {
            // SAFETY: header-build pointer produced by stamp.
            let raw = unsafe { header::raw_of(ptr) };
            let Some(total) = new_size.checked_add(header::PREFIX_SIZE) else {
                self.raise_oom(new_size);
            };
            let new_raw = match placement {
                // SAFETY: raw is the backend's base pointer in the
                // classified pool.
                Placement::Dram => unsafe { self.backend.raw_resize(raw, total) },
                Placement::Pmem => unsafe { self.backend.raw_resize_pmem(raw, total) },
            };
            let Some(new_raw) = NonNull::new(new_raw) else {
                self.raise_oom(new_size);
            };
            // SAFETY: new_raw spans PREFIX_SIZE + new_size writable bytes.
            let user = unsafe { header::stamp(new_raw, new_size) };
            self.usage.decrement(placement, old_footprint);
            self.usage.increment(placement, total);
            user.as_ptr()
        }
    }

    // ------------------------------------------------------------------
    // deallocation
    // ------------------------------------------------------------------

    /// Releases a block; a null `ptr` is a safe idempotent no-op.
    ///
    /// The block's pool is classified from the pointer itself and the
    /// matching counter shrinks by the recovered footprint.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer previously returned by this
    /// heap and not freed since.
    pub unsafe fn deallocate(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        // SAFETY: non-null live pointer per caller contract.
        let placement = unsafe { self.backend.classify(ptr) };
        unsafe { self.free_in(ptr, placement) };
    }

    /// Releases a block known to live in the persistent pool.
    ///
    /// Aborts when the active backend has no persistent pool.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer from [`Self::allocate_pmem`].
    pub unsafe fn deallocate_pmem(&self, ptr: *mut u8) {
        if !self.backend.supports_pmem() {
            pmem_unavailable();
        }
        if ptr.is_null() {
            return;
        }
        // SAFETY: non-null live pmem pointer per caller contract.
        unsafe { self.free_in(ptr, Placement::Pmem) };
    }

    unsafe fn free_in(&self, ptr: *mut u8, placement: Placement) {
        // SAFETY: live pointer per caller contract.
        let footprint = unsafe { self.footprint(ptr) };
        self.usage.decrement(placement, footprint);
        let raw = if B::NATIVE_SIZE {
            ptr
        } else {
            // SAFETY: header-build pointer produced by stamp.
            unsafe { header::raw_of(ptr) }
        };
        match placement {
            // SAFETY: raw is the backend's own base pointer for this block.
            Placement::Dram => unsafe { self.backend.raw_free(raw) },
            Placement::Pmem => unsafe { self.backend.raw_free_pmem(raw) },
        }
    }

    // ------------------------------------------------------------------
    // thread-cache bypass (defragmentation escape hatch)
    // ------------------------------------------------------------------

    /// [`Self::allocate`] skipping any per-thread caching layer.
    ///
    /// Blocks come straight from the global arena so a compacting caller
    /// sees real placement; the counter discipline is identical to the
    /// normal path.
    pub fn allocate_uncached(&self, size: usize) -> NonNull<u8> {
        if B::NATIVE_SIZE {
            let Some(ptr) = NonNull::new(self.backend.raw_alloc_uncached(size)) else {
                self.raise_oom(size);
            };
            // SAFETY: freshly returned live pointer.
            self.usage.increment(Placement::Dram, unsafe {
                self.backend.allocated_size(ptr.as_ptr())
            });
            ptr
        } else {
            let Some(total) = size.checked_add(header::PREFIX_SIZE) else {
                self.raise_oom(size);
            };
            let Some(raw) = NonNull::new(self.backend.raw_alloc_uncached(total)) else {
                self.raise_oom(size);
            };
            // SAFETY: raw spans total writable bytes.
            let user = unsafe { header::stamp(raw, size) };
            self.usage.increment(Placement::Dram, total);
            user
        }
    }

    /// [`Self::deallocate`] skipping any per-thread caching layer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live DRAM pointer returned by this heap.
    pub unsafe fn deallocate_uncached(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        // SAFETY: live pointer per caller contract.
        let footprint = unsafe { self.footprint(ptr) };
        self.usage.decrement(Placement::Dram, footprint);
        let raw = if B::NATIVE_SIZE {
            ptr
        } else {
            // SAFETY: header-build pointer produced by stamp.
            unsafe { header::raw_of(ptr) }
        };
        // SAFETY: raw is the backend's base pointer for this block.
        unsafe { self.backend.raw_free_uncached(raw) };
    }

    // ------------------------------------------------------------------
    // size recovery
    // ------------------------------------------------------------------

    /// Usable bytes of a live block; always at least the requested size.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live pointer previously returned by this heap.
    pub unsafe fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        if B::NATIVE_SIZE {
            // SAFETY: live pointer per caller contract.
            unsafe { self.backend.allocated_size(ptr.as_ptr()) }
        } else {
            // SAFETY: header-build pointer produced by stamp.
            unsafe { header::logical_size(ptr.as_ptr()) }
        }
    }

    /// Footprint charged to the counters for a live block.
    ///
    /// Symmetric across allocate and deallocate: a free decrements exactly
    /// what the matching allocate incremented.
    unsafe fn footprint(&self, ptr: *mut u8) -> usize {
        if B::NATIVE_SIZE {
            // SAFETY: live pointer per caller contract.
            unsafe { self.backend.allocated_size(ptr) }
        } else {
            // SAFETY: header-build pointer carries a size prefix.
            pad_to_word(unsafe { header::logical_size(ptr) }) + header::PREFIX_SIZE
        }
    }

    // ------------------------------------------------------------------
    // accounting and introspection
    // ------------------------------------------------------------------

    /// Bytes the heap believes are live in DRAM. A counter snapshot: fast
    /// enough for hot paths, unlike [`Self::resident_set_size`].
    pub fn current_dram_usage(&self) -> usize {
        self.usage.dram_bytes()
    }

    /// Bytes live in the persistent pool.
    pub fn current_pmem_usage(&self) -> usize {
        self.usage.pmem_bytes()
    }

    /// OS-reported resident set size, in bytes.
    ///
    /// Performs file or syscall I/O and is too slow for busy loops; use
    /// [`Self::current_dram_usage`] for a fast approximation. On a platform
    /// with no OS probe this returns the DRAM counter itself, so
    /// fragmentation reads as "none" in that degraded mode. Probe errors on
    /// a supported platform read as zero.
    pub fn resident_set_size(&self) -> u64 {
        rss_or_counter(memtally_probe::resident_set_size(), self.current_dram_usage())
    }

    /// Backend-native statistics, epoch-refreshed; all zeros when the
    /// backend exposes no introspection API.
    pub fn native_stats(&self) -> AllocatorStats {
        self.backend.native_stats().unwrap_or_default()
    }

    /// Enables or disables the backend's asynchronous page reclamation.
    pub fn set_background_purge(&self, enabled: bool) -> bool {
        self.backend.set_background_purge(enabled)
    }

    /// Forces unused pages back to the OS.
    pub fn purge_unused_pages(&self) -> bool {
        self.backend.purge_unused_pages()
    }

    /// Read access to the active backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// Degraded-mode policy for RSS: probe errors on a supported platform read
/// as zero; absence of any platform probe falls back to the DRAM counter.
fn rss_or_counter(probed: Result<u64, memtally_probe::ProbeError>, dram_bytes: usize) -> u64 {
    match probed {
        Ok(bytes) => bytes,
        Err(memtally_probe::ProbeError::Unsupported) => dram_bytes as u64,
        Err(_) => 0,
    }
}
