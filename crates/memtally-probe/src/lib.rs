//! # memtally-probe
//!
//! Read-only OS probes for process memory: resident set size, per-region
//! smaps field aggregation, private dirty bytes, and installed physical
//! memory. One platform implementation is compiled per target; everything
//! here performs file or syscall I/O and is too slow for hot paths.
//!
//! Probes never mutate process or allocator state. Failures are reported as
//! [`ProbeError`] values; callers on observability paths are expected to
//! recover to a zero or fallback figure rather than propagate.

mod error;

pub use error::ProbeError;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
use linux as imp;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
use macos as imp;

#[cfg(target_os = "freebsd")]
mod freebsd;
#[cfg(target_os = "freebsd")]
use freebsd as imp;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "freebsd")))]
mod unsupported;
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "freebsd")))]
use unsupported as imp;

/// OS-reported resident set size of the current process, in bytes.
///
/// Linux reads `/proc/self/stat`, macOS queries the kernel task-info API,
/// FreeBSD queries the `kern.proc.pid` sysctl. Platforms with no probe
/// return [`ProbeError::Unsupported`] so the caller can substitute its own
/// estimate.
pub fn resident_set_size() -> Result<u64, ProbeError> {
    imp::resident_set_size()
}

/// Sums `field` across every mapped region of a process, in bytes.
///
/// `field` uses the trailing-colon smaps spelling (`"Rss:"`,
/// `"Private_Dirty:"`). `pid` of `None` means the current process. Linux
/// scans `/proc/<pid>/smaps` and converts kB to bytes; macOS falls back to
/// the coarser per-region kernel API, which only knows resident and dirty
/// pages (any other field reads as zero).
pub fn smaps_field_sum(field: &str, pid: Option<u32>) -> Result<u64, ProbeError> {
    imp::smaps_field_sum(field, pid)
}

/// Private dirty bytes of a process, summed across its regions.
pub fn private_dirty_bytes(pid: Option<u32>) -> Result<u64, ProbeError> {
    smaps_field_sum("Private_Dirty:", pid)
}

/// Size of one virtual memory page in bytes.
#[cfg(unix)]
#[must_use]
pub fn page_size() -> u64 {
    // SAFETY: sysconf with a valid name has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as u64 } else { 4096 }
}

/// Size of one virtual memory page in bytes.
#[cfg(not(unix))]
#[must_use]
pub fn page_size() -> u64 {
    4096
}

/// Total installed physical memory (RAM) in bytes, or 0 when no OS
/// mechanism is available.
#[cfg(target_os = "macos")]
#[must_use]
pub fn physical_memory_size() -> u64 {
    let mut mib = [libc::CTL_HW, libc::HW_MEMSIZE];
    let mut size: i64 = 0;
    let mut len = std::mem::size_of::<i64>();
    // SAFETY: mib names hw.memsize and size/len describe a valid i64 slot.
    let rc = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            2,
            (&raw mut size).cast(),
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc == 0 && size > 0 { size as u64 } else { 0 }
}

/// Total installed physical memory (RAM) in bytes, or 0 when no OS
/// mechanism is available.
#[cfg(all(unix, not(target_os = "macos")))]
#[must_use]
pub fn physical_memory_size() -> u64 {
    // SAFETY: sysconf with valid names has no preconditions.
    let pages = unsafe { libc::sysconf(libc::_SC_PHYS_PAGES) };
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if pages > 0 && page > 0 {
        pages as u64 * page as u64
    } else {
        0
    }
}

/// Total installed physical memory (RAM) in bytes, or 0 when no OS
/// mechanism is available.
#[cfg(not(unix))]
#[must_use]
pub fn physical_memory_size() -> u64 {
    0
}
