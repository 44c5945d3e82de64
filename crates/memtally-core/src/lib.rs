//! # memtally-core
//!
//! Allocation accounting and introspection between a host process and a
//! build-time heap backend. Every allocation's logical size stays
//! recoverable from the pointer alone (a native backend size query, or a
//! word-sized prefix written in front of the block), DRAM/persistent
//! placement is classified from the pointer itself, and two atomic counters
//! track the bytes the process believes it has live in each pool.
//!
//! This crate wraps allocators; it does not implement one. There is no free
//! list and no arena carving here, and the counters make no claim of
//! byte-exact agreement with OS-reported figures. Callers only ever go
//! through [`TrackedHeap`]; backend failure is routed through the
//! non-returning [`OomHandler`] rather than surfaced as a null return.

pub mod api;
pub mod backend;
pub mod counters;
pub mod header;
pub mod introspect;
pub mod oom;
pub mod placement;

pub use api::TrackedHeap;
pub use backend::{AllocBackend, AllocatorStats, DefaultBackend, SystemHeap};
pub use counters::UsageCounters;
pub use introspect::{physical_memory_size, private_dirty_bytes, smaps_field_sum};
pub use memtally_probe::ProbeError;
pub use oom::{AbortOnOom, OomHandler};
pub use placement::Placement;
