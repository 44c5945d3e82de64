//! Default platform heap via libc.
//!
//! `malloc_usable_size` is not portable across libcs, so this backend keeps
//! no native size query and the wrapper records sizes in the tracking
//! header instead.

use std::ffi::c_void;

use crate::backend::AllocBackend;

/// The platform `malloc`/`calloc`/`realloc`/`free` heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHeap;

impl AllocBackend for SystemHeap {
    const NATIVE_SIZE: bool = false;

    fn raw_alloc(&self, size: usize) -> *mut u8 {
        // SAFETY: malloc accepts any size; null is handled by the caller.
        unsafe { libc::malloc(size).cast() }
    }

    fn raw_zero_alloc(&self, size: usize) -> *mut u8 {
        // SAFETY: as raw_alloc.
        unsafe { libc::calloc(1, size).cast() }
    }

    unsafe fn raw_resize(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        // SAFETY: caller passes a live base pointer from this heap.
        unsafe { libc::realloc(ptr.cast::<c_void>(), size).cast() }
    }

    unsafe fn raw_free(&self, ptr: *mut u8) {
        // SAFETY: caller passes a live base pointer from this heap.
        unsafe { libc::free(ptr.cast::<c_void>()) }
    }
}
