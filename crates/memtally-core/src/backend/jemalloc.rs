//! jemalloc backend via `tikv-jemalloc-sys`.
//!
//! jemalloc reports usable sizes natively (no tracking header needed),
//! supports thread-cache-bypass allocation for defragmentation, and exposes
//! statistics, background purging, and forced purging through `mallctl`.

use std::ffi::{CString, c_char, c_void};
use std::ptr;

use tikv_jemalloc_sys as ffi;

use crate::backend::{AllocBackend, AllocatorStats};

/// `MALLOCX_TCACHE(-1)`: bypass the thread cache, straight to the arena bins.
const MALLOCX_TCACHE_NONE: libc::c_int = 1 << 8;

/// The jemalloc heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct JemallocHeap;

/// Reads one fixed-size mallctl value.
///
/// # Safety
///
/// `T` must match the mallctl's documented value type exactly.
unsafe fn mallctl_read<T: Default>(name: &[u8]) -> Option<T> {
    debug_assert!(name.ends_with(b"\0"));
    let mut value = T::default();
    let mut len = std::mem::size_of::<T>();
    // SAFETY: name is NUL-terminated; value/len describe a valid T slot.
    let rc = unsafe {
        ffi::mallctl(
            name.as_ptr().cast::<c_char>(),
            (&raw mut value).cast::<c_void>(),
            &mut len,
            ptr::null_mut(),
            0,
        )
    };
    (rc == 0).then_some(value)
}

/// Writes one fixed-size mallctl value.
///
/// # Safety
///
/// `T` must match the mallctl's documented value type exactly.
unsafe fn mallctl_write<T>(name: &[u8], mut value: T) -> bool {
    debug_assert!(name.ends_with(b"\0"));
    // SAFETY: name is NUL-terminated; value/size describe a valid T slot.
    let rc = unsafe {
        ffi::mallctl(
            name.as_ptr().cast::<c_char>(),
            ptr::null_mut(),
            ptr::null_mut(),
            (&raw mut value).cast::<c_void>(),
            std::mem::size_of::<T>(),
        )
    };
    rc == 0
}

impl AllocBackend for JemallocHeap {
    const NATIVE_SIZE: bool = true;

    fn raw_alloc(&self, size: usize) -> *mut u8 {
        // SAFETY: plain jemalloc malloc.
        unsafe { ffi::malloc(size.max(1)).cast() }
    }

    fn raw_zero_alloc(&self, size: usize) -> *mut u8 {
        // SAFETY: plain jemalloc calloc.
        unsafe { ffi::calloc(1, size.max(1)).cast() }
    }

    unsafe fn raw_resize(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        // SAFETY: caller passes a live jemalloc pointer.
        unsafe { ffi::realloc(ptr.cast::<c_void>(), size.max(1)).cast() }
    }

    unsafe fn raw_free(&self, ptr: *mut u8) {
        // SAFETY: caller passes a live jemalloc pointer.
        unsafe { ffi::free(ptr.cast::<c_void>()) }
    }

    unsafe fn allocated_size(&self, ptr: *mut u8) -> usize {
        // SAFETY: caller passes a live jemalloc pointer.
        unsafe { ffi::malloc_usable_size(ptr.cast::<c_void>()) }
    }

    fn raw_alloc_uncached(&self, size: usize) -> *mut u8 {
        // mallocx requires a non-zero size.
        // SAFETY: flags request tcache bypass only.
        unsafe { ffi::mallocx(size.max(1), MALLOCX_TCACHE_NONE).cast() }
    }

    unsafe fn raw_free_uncached(&self, ptr: *mut u8) {
        // SAFETY: caller passes a live jemalloc pointer; flags match the
        // uncached allocation path.
        unsafe { ffi::dallocx(ptr.cast::<c_void>(), MALLOCX_TCACHE_NONE) }
    }

    fn native_stats(&self) -> Option<AllocatorStats> {
        // Advance the epoch so the stats mallctls see a fresh snapshot.
        if !unsafe { mallctl_write(b"epoch\0", 1u64) } {
            return None;
        }
        // SAFETY: stats.* mallctls read size_t values.
        let allocated = unsafe { mallctl_read::<usize>(b"stats.allocated\0") }?;
        let active = unsafe { mallctl_read::<usize>(b"stats.active\0") }?;
        let resident = unsafe { mallctl_read::<usize>(b"stats.resident\0") }?;
        Some(AllocatorStats {
            allocated: allocated as u64,
            active: active as u64,
            resident: resident as u64,
        })
    }

    fn set_background_purge(&self, enabled: bool) -> bool {
        // SAFETY: background_thread takes a one-byte bool.
        unsafe { mallctl_write(b"background_thread\0", u8::from(enabled)) }
    }

    fn purge_unused_pages(&self) -> bool {
        // arena.<narenas>.purge addresses the merged "all arenas" pseudo
        // index one past the real arenas.
        let Some(narenas) = (unsafe { mallctl_read::<u32>(b"arenas.narenas\0") }) else {
            return false;
        };
        let Ok(name) = CString::new(format!("arena.{narenas}.purge")) else {
            return false;
        };
        // SAFETY: a void mallctl, no in/out parameters.
        unsafe {
            ffi::mallctl(
                name.as_ptr(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                0,
            ) == 0
        }
    }
}
