//! Process-level memory introspection, degraded-mode wrappers.
//!
//! The raw probes in `memtally-probe` return typed errors; the reporting
//! surfaces here follow the convention that an unreadable or unsupported
//! figure reads as zero, so callers can print a report unconditionally.

/// Sum, in bytes, of one named smaps field across every mapping of a
/// process. `pid` of `None` targets the current process.
///
/// Reads as zero on platforms without a smaps equivalent and on processes
/// that cannot be inspected.
pub fn smaps_field_sum(field: &str, pid: Option<u32>) -> u64 {
    memtally_probe::smaps_field_sum(field, pid).unwrap_or(0)
}

/// Private dirty bytes of a process: resident pages neither shared with nor
/// restorable from any file, the closest per-mapping answer to "what does
/// this process alone cost". Reads as zero where unavailable.
pub fn private_dirty_bytes(pid: Option<u32>) -> u64 {
    memtally_probe::private_dirty_bytes(pid).unwrap_or(0)
}

/// Total physical memory installed, in bytes; zero where undetectable.
pub fn physical_memory_size() -> u64 {
    memtally_probe::physical_memory_size()
}
