//! macOS probes backed by the libproc kernel interface.
//!
//! macOS has no smaps report; the per-region `proc_pidinfo` flavor only
//! knows resident and dirtied page counts, so any other field sums to zero.

use std::ffi::c_void;

use crate::ProbeError;

// Flavors from <sys/proc_info.h>.
const PROC_PIDTASKINFO: libc::c_int = 4;
const PROC_PIDREGIONINFO: libc::c_int = 7;

/// Mirror of `struct proc_taskinfo` from <sys/proc_info.h>.
#[repr(C)]
#[derive(Default)]
struct ProcTaskInfo {
    pti_virtual_size: u64,
    pti_resident_size: u64,
    pti_total_user: u64,
    pti_total_system: u64,
    pti_threads_user: u64,
    pti_threads_system: u64,
    pti_policy: i32,
    pti_faults: i32,
    pti_pageins: i32,
    pti_cow_faults: i32,
    pti_messages_sent: i32,
    pti_messages_received: i32,
    pti_syscalls_mach: i32,
    pti_syscalls_unix: i32,
    pti_csw: i32,
    pti_threadnum: i32,
    pti_numrunning: i32,
    pti_priority: i32,
}

/// Mirror of `struct proc_regioninfo` from <sys/proc_info.h>.
#[repr(C)]
#[derive(Default)]
struct ProcRegionInfo {
    pri_protection: u32,
    pri_max_protection: u32,
    pri_inheritance: u32,
    pri_flags: u32,
    pri_offset: u64,
    pri_behavior: u32,
    pri_user_wired_count: u32,
    pri_user_tag: u32,
    pri_pages_resident: u32,
    pri_pages_shared_now_private: u32,
    pri_pages_swapped_out: u32,
    pri_pages_dirtied: u32,
    pri_ref_count: u32,
    pri_shadow_depth: u32,
    pri_share_mode: u32,
    pri_private_pages_resident: u32,
    pri_shared_pages_resident: u32,
    pri_obj_id: u32,
    pri_depth: u32,
    pri_address: u64,
    pri_size: u64,
}

/// Resident set size via the kernel task-info query.
pub(crate) fn resident_set_size() -> Result<u64, ProbeError> {
    let mut info = ProcTaskInfo::default();
    let wanted = std::mem::size_of::<ProcTaskInfo>() as libc::c_int;
    // SAFETY: buffer and size describe a valid ProcTaskInfo slot.
    let got = unsafe {
        libc::proc_pidinfo(
            libc::getpid(),
            PROC_PIDTASKINFO,
            0,
            (&raw mut info).cast::<c_void>(),
            wanted,
        )
    };
    if got == wanted {
        Ok(info.pti_resident_size)
    } else {
        Err(ProbeError::Malformed("proc_pidinfo(PROC_PIDTASKINFO)".into()))
    }
}

/// Coarse stand-in for the smaps field sum.
///
/// The region-info query reports a fixed subset of per-region statistics;
/// fields outside that subset unconditionally sum to zero.
pub(crate) fn smaps_field_sum(field: &str, pid: Option<u32>) -> Result<u64, ProbeError> {
    // SAFETY: getpid has no preconditions.
    let pid = pid.map_or_else(|| unsafe { libc::getpid() }, |p| p as libc::c_int);
    let page = crate::page_size();
    let wanted = std::mem::size_of::<ProcRegionInfo>() as libc::c_int;

    let mut pages = 0u64;
    let mut address = 0u64;
    loop {
        let mut info = ProcRegionInfo::default();
        // SAFETY: buffer and size describe a valid ProcRegionInfo slot; the
        // arg selects the first region at or above address.
        let got = unsafe {
            libc::proc_pidinfo(
                pid,
                PROC_PIDREGIONINFO,
                address,
                (&raw mut info).cast::<c_void>(),
                wanted,
            )
        };
        // Short read or error means no region at or above address.
        if got != wanted {
            break;
        }
        pages += match field {
            "Rss:" => u64::from(info.pri_pages_resident),
            "Private_Dirty:" => u64::from(info.pri_pages_dirtied),
            _ => return Ok(0),
        };
        let Some(next) = info.pri_address.checked_add(info.pri_size) else {
            break;
        };
        address = next;
    }
    Ok(pages * page)
}
