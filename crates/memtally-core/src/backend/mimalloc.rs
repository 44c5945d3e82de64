//! mimalloc backend via `libmimalloc-sys`.
//!
//! mimalloc reports usable sizes natively and offers a synchronous collect
//! for returning unused pages; it has no numeric statistics API, so
//! [`native_stats`](crate::AllocBackend::native_stats) stays at the default
//! `None`.

use std::ffi::c_void;

use libmimalloc_sys as ffi;

use crate::backend::AllocBackend;

/// The mimalloc heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct MimallocHeap;

impl AllocBackend for MimallocHeap {
    const NATIVE_SIZE: bool = true;

    fn raw_alloc(&self, size: usize) -> *mut u8 {
        // SAFETY: plain mimalloc malloc.
        unsafe { ffi::mi_malloc(size.max(1)).cast() }
    }

    fn raw_zero_alloc(&self, size: usize) -> *mut u8 {
        // SAFETY: plain mimalloc zeroed malloc.
        unsafe { ffi::mi_zalloc(size.max(1)).cast() }
    }

    unsafe fn raw_resize(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        // SAFETY: caller passes a live mimalloc pointer.
        unsafe { ffi::mi_realloc(ptr.cast::<c_void>(), size.max(1)).cast() }
    }

    unsafe fn raw_free(&self, ptr: *mut u8) {
        // SAFETY: caller passes a live mimalloc pointer.
        unsafe { ffi::mi_free(ptr.cast::<c_void>()) }
    }

    unsafe fn allocated_size(&self, ptr: *mut u8) -> usize {
        // SAFETY: caller passes a live mimalloc pointer.
        unsafe { ffi::mi_usable_size(ptr.cast::<c_void>()) }
    }

    fn purge_unused_pages(&self) -> bool {
        // Forced collect returns freed pages to the OS.
        // SAFETY: mi_collect has no preconditions.
        unsafe { ffi::mi_collect(true) };
        true
    }
}
