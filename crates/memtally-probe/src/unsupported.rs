//! Stub for platforms with no OS memory probe.
//!
//! Returning [`ProbeError::Unsupported`] lets callers fall back to their own
//! accounting (the documented degraded mode where fragmentation always
//! reports as "none").

use crate::ProbeError;

pub(crate) fn resident_set_size() -> Result<u64, ProbeError> {
    Err(ProbeError::Unsupported)
}

pub(crate) fn smaps_field_sum(_field: &str, _pid: Option<u32>) -> Result<u64, ProbeError> {
    Err(ProbeError::Unsupported)
}
