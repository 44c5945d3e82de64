//! Process-wide out-of-memory policy.

use std::process;

/// Strategy invoked when the backend cannot satisfy an allocation.
///
/// Called synchronously in the failing call's context, at most once per
/// failed call, with the originally requested size. The `-> !` return type
/// carries the contract that control never comes back to the allocation
/// API: conforming implementations terminate the process, or unwind through
/// a fatal-error facility such as `panic!`. There is no retry path.
pub trait OomHandler: Send + Sync {
    fn handle_oom(&self, requested: usize) -> !;
}

/// Default policy: print a diagnostic with the failed size and abort.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortOnOom;

impl OomHandler for AbortOnOom {
    fn handle_oom(&self, requested: usize) -> ! {
        eprintln!("memtally: out of memory trying to allocate {requested} bytes");
        process::abort();
    }
}

/// Fatal diagnostic for persistent-memory requests against a backend with
/// no persistent pool. There is no DRAM fallback: silently changing
/// placement would break durability expectations the caller may hold.
pub(crate) fn pmem_unavailable() -> ! {
    eprintln!("memtally: persistent-memory operation on a backend without pmem support");
    process::abort();
}
