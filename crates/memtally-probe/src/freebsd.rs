//! FreeBSD probes backed by the `kern.proc.pid` sysctl.

use std::io;
use std::ptr;

use crate::ProbeError;

/// Resident set size via `kinfo_proc.ki_rssize` (pages).
pub(crate) fn resident_set_size() -> Result<u64, ProbeError> {
    // SAFETY: getpid has no preconditions.
    let pid = unsafe { libc::getpid() };
    let mib = [libc::CTL_KERN, libc::KERN_PROC, libc::KERN_PROC_PID, pid];
    let mut info: libc::kinfo_proc = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::kinfo_proc>();
    // SAFETY: mib names this process and info/len describe a valid kinfo_proc slot.
    let rc = unsafe {
        libc::sysctl(
            mib.as_ptr(),
            4,
            (&raw mut info).cast(),
            &mut len,
            ptr::null(),
            0,
        )
    };
    if rc == 0 {
        Ok(info.ki_rssize as u64 * crate::page_size())
    } else {
        Err(ProbeError::Io {
            path: "kern.proc.pid".into(),
            source: io::Error::last_os_error(),
        })
    }
}

/// FreeBSD exposes no smaps-style per-region report through sysctl.
pub(crate) fn smaps_field_sum(_field: &str, _pid: Option<u32>) -> Result<u64, ProbeError> {
    Err(ProbeError::Unsupported)
}
