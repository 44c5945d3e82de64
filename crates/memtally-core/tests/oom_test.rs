//! Out-of-memory policy dispatch.
//!
//! The default policy aborts the process, which a test cannot observe
//! in-process; these tests install a panicking handler instead and drive
//! failure through a backend with a switchable fail flag.

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use memtally_core::{AllocBackend, OomHandler, TrackedHeap};

#[derive(Default)]
struct FlakyHeap {
    fail_next: AtomicBool,
}

impl FlakyHeap {
    fn fail_next(&self) {
        self.fail_next.store(true, Ordering::Relaxed);
    }

    fn should_fail(&self) -> bool {
        self.fail_next.swap(false, Ordering::Relaxed)
    }
}

impl AllocBackend for FlakyHeap {
    const NATIVE_SIZE: bool = false;

    fn raw_alloc(&self, size: usize) -> *mut u8 {
        if self.should_fail() {
            return std::ptr::null_mut();
        }
        // SAFETY: plain malloc.
        unsafe { libc::malloc(size).cast() }
    }

    fn raw_zero_alloc(&self, size: usize) -> *mut u8 {
        if self.should_fail() {
            return std::ptr::null_mut();
        }
        // SAFETY: plain calloc.
        unsafe { libc::calloc(1, size).cast() }
    }

    unsafe fn raw_resize(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        if self.should_fail() {
            return std::ptr::null_mut();
        }
        // SAFETY: caller passes a live base pointer.
        unsafe { libc::realloc(ptr.cast::<c_void>(), size).cast() }
    }

    unsafe fn raw_free(&self, ptr: *mut u8) {
        // SAFETY: caller passes a live base pointer.
        unsafe { libc::free(ptr.cast::<c_void>()) }
    }
}

struct PanicOnOom {
    invocations: Arc<AtomicUsize>,
    last_requested: Arc<AtomicUsize>,
}

impl OomHandler for PanicOnOom {
    fn handle_oom(&self, requested: usize) -> ! {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.last_requested.store(requested, Ordering::Relaxed);
        panic!("allocation of {requested} bytes failed");
    }
}

fn recording_heap() -> (TrackedHeap<FlakyHeap>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let heap = TrackedHeap::new(FlakyHeap::default());
    let invocations = Arc::new(AtomicUsize::new(0));
    let last_requested = Arc::new(AtomicUsize::new(0));
    heap.set_oom_handler(Box::new(PanicOnOom {
        invocations: Arc::clone(&invocations),
        last_requested: Arc::clone(&last_requested),
    }));
    (heap, invocations, last_requested)
}

#[test]
fn failed_allocation_invokes_the_handler_once_with_the_logical_size() {
    let (heap, invocations, last_requested) = recording_heap();
    heap.backend().fail_next();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| heap.allocate(777)));
    assert!(outcome.is_err());
    assert_eq!(invocations.load(Ordering::Relaxed), 1);
    // The handler sees the caller's requested size, not the padded or
    // header-extended footprint.
    assert_eq!(last_requested.load(Ordering::Relaxed), 777);
    assert_eq!(heap.current_dram_usage(), 0);
}

#[test]
fn failed_zero_allocation_reports_too() {
    let (heap, invocations, _) = recording_heap();
    heap.backend().fail_next();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| heap.zero_allocate(64)));
    assert!(outcome.is_err());
    assert_eq!(invocations.load(Ordering::Relaxed), 1);
    assert_eq!(heap.current_dram_usage(), 0);
}

#[test]
fn failed_resize_leaves_the_old_block_and_counters_intact() {
    let (heap, invocations, last_requested) = recording_heap();

    let ptr = heap.allocate(64);
    let charged = heap.current_dram_usage();
    heap.backend().fail_next();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: ptr is live; on failure the handler fires before any
        // counter movement and the block stays valid.
        unsafe { heap.resize(ptr.as_ptr(), 4096) }
    }));
    assert!(outcome.is_err());
    assert_eq!(invocations.load(Ordering::Relaxed), 1);
    assert_eq!(last_requested.load(Ordering::Relaxed), 4096);
    assert_eq!(heap.current_dram_usage(), charged);

    // SAFETY: the old block survived the failed resize.
    unsafe {
        std::ptr::write_bytes(ptr.as_ptr(), 0xEE, 64);
        heap.deallocate(ptr.as_ptr());
    }
    assert_eq!(heap.current_dram_usage(), 0);
}

#[test]
fn successful_paths_never_touch_the_handler() {
    let (heap, invocations, _) = recording_heap();

    let ptr = heap.allocate(128);
    // SAFETY: ptr tracks the single live block.
    unsafe {
        let grown = heap.resize(ptr.as_ptr(), 512);
        heap.deallocate(grown);
    }
    assert_eq!(invocations.load(Ordering::Relaxed), 0);
    assert_eq!(heap.current_dram_usage(), 0);
}
