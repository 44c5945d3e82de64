//! Placement routing against a backend with two real pools.
//!
//! The shipped backends expose no persistent pool, so routing is exercised
//! here with a split-pool double: both pools sit on the platform heap, and
//! a registry of persistent block ranges drives pointer classification the
//! way a persistent-memory kit's ownership query would.

use std::ffi::c_void;
use std::ptr;

use parking_lot::Mutex;

use memtally_core::{AllocBackend, Placement, TrackedHeap};

#[derive(Default)]
struct SplitPoolBackend {
    // (base address, allocation size) per live persistent block.
    pmem_blocks: Mutex<Vec<(usize, usize)>>,
}

impl SplitPoolBackend {
    fn live_pmem_blocks(&self) -> usize {
        self.pmem_blocks.lock().len()
    }
}

impl AllocBackend for SplitPoolBackend {
    const NATIVE_SIZE: bool = false;

    fn raw_alloc(&self, size: usize) -> *mut u8 {
        // SAFETY: plain malloc.
        unsafe { libc::malloc(size).cast() }
    }

    fn raw_zero_alloc(&self, size: usize) -> *mut u8 {
        // SAFETY: plain calloc.
        unsafe { libc::calloc(1, size).cast() }
    }

    unsafe fn raw_resize(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        // SAFETY: caller passes a live DRAM base pointer.
        unsafe { libc::realloc(ptr.cast::<c_void>(), size).cast() }
    }

    unsafe fn raw_free(&self, ptr: *mut u8) {
        assert!(
            !self
                .pmem_blocks
                .lock()
                .iter()
                .any(|&(base, _)| base == ptr as usize),
            "persistent block released through the DRAM pool"
        );
        // SAFETY: caller passes a live DRAM base pointer.
        unsafe { libc::free(ptr.cast::<c_void>()) }
    }

    fn supports_pmem(&self) -> bool {
        true
    }

    unsafe fn classify(&self, ptr: *mut u8) -> Placement {
        let addr = ptr as usize;
        // Interior addresses classify too: the wrapper queries with the
        // user pointer, which sits past the tracking header.
        let owned = self
            .pmem_blocks
            .lock()
            .iter()
            .any(|&(base, size)| addr >= base && addr < base + size);
        if owned { Placement::Pmem } else { Placement::Dram }
    }

    fn raw_alloc_pmem(&self, size: usize) -> *mut u8 {
        // SAFETY: plain malloc standing in for the persistent pool.
        let ptr = unsafe { libc::malloc(size) }.cast::<u8>();
        if !ptr.is_null() {
            self.pmem_blocks.lock().push((ptr as usize, size));
        }
        ptr
    }

    unsafe fn raw_resize_pmem(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        let mut blocks = self.pmem_blocks.lock();
        let idx = blocks
            .iter()
            .position(|&(base, _)| base == ptr as usize)
            .expect("resize of an unregistered persistent block");
        // SAFETY: caller passes a live persistent base pointer.
        let new_ptr = unsafe { libc::realloc(ptr.cast::<c_void>(), size) }.cast::<u8>();
        if !new_ptr.is_null() {
            blocks[idx] = (new_ptr as usize, size);
        }
        new_ptr
    }

    unsafe fn raw_free_pmem(&self, ptr: *mut u8) {
        let mut blocks = self.pmem_blocks.lock();
        let idx = blocks
            .iter()
            .position(|&(base, _)| base == ptr as usize)
            .expect("free of an unregistered persistent block");
        blocks.swap_remove(idx);
        // SAFETY: caller passes a live persistent base pointer.
        unsafe { libc::free(ptr.cast::<c_void>()) }
    }
}

#[test]
fn pmem_allocation_charges_only_the_pmem_counter() {
    let heap = TrackedHeap::new(SplitPoolBackend::default());

    let ptr = heap.allocate_pmem(128);
    assert!(heap.current_pmem_usage() >= 128);
    assert_eq!(heap.current_dram_usage(), 0);
    assert_eq!(heap.backend().live_pmem_blocks(), 1);

    // SAFETY: ptr is live and freed exactly once.
    unsafe { heap.deallocate_pmem(ptr.as_ptr()) };
    assert_eq!(heap.current_pmem_usage(), 0);
    assert_eq!(heap.backend().live_pmem_blocks(), 0);
}

#[test]
fn deallocate_routes_by_classifying_the_pointer() {
    let heap = TrackedHeap::new(SplitPoolBackend::default());

    let dram = heap.allocate(64);
    let pmem = heap.allocate_pmem(64);
    assert!(heap.current_dram_usage() >= 64);
    assert!(heap.current_pmem_usage() >= 64);

    // The pool-agnostic free classifies each pointer itself; the backend
    // asserts no persistent block ever reaches the DRAM pool.
    // SAFETY: both pointers are live and freed exactly once.
    unsafe {
        heap.deallocate(pmem.as_ptr());
        heap.deallocate(dram.as_ptr());
    }
    assert_eq!(heap.current_dram_usage(), 0);
    assert_eq!(heap.current_pmem_usage(), 0);
}

#[test]
fn resize_stays_in_the_owning_pool() {
    let heap = TrackedHeap::new(SplitPoolBackend::default());

    let ptr = heap.allocate_pmem(32);
    // SAFETY: ptr tracks the single live persistent block.
    let grown = unsafe { heap.resize(ptr.as_ptr(), 2048) };
    assert!(!grown.is_null());
    assert!(heap.current_pmem_usage() >= 2048);
    assert_eq!(heap.current_dram_usage(), 0);
    assert_eq!(heap.backend().live_pmem_blocks(), 1);

    // SAFETY: grown is live and freed exactly once.
    unsafe { heap.deallocate(grown) };
    assert_eq!(heap.current_pmem_usage(), 0);
}

#[test]
fn resize_pmem_null_and_zero_follow_allocate_and_free_semantics() {
    let heap = TrackedHeap::new(SplitPoolBackend::default());

    // SAFETY: null is explicitly accepted.
    let ptr = unsafe { heap.resize_pmem(ptr::null_mut(), 48) };
    assert!(!ptr.is_null());
    assert!(heap.current_pmem_usage() >= 48);

    // SAFETY: ptr is live; size zero frees it.
    let gone = unsafe { heap.resize_pmem(ptr, 0) };
    assert!(gone.is_null());
    assert_eq!(heap.current_pmem_usage(), 0);
    assert_eq!(heap.backend().live_pmem_blocks(), 0);
}
