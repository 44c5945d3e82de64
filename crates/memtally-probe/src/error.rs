//! Probe failure taxonomy.
//!
//! Every error here lives on an observability path: callers recover to a
//! zero or fallback value and keep going. Nothing in this crate aborts.

use std::io;

use thiserror::Error;

/// Reasons an OS memory probe can fail.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// A proc pseudo-file or kernel API could not be read.
    #[error("probe read of {path} failed: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A proc pseudo-file did not have the expected shape.
    #[error("malformed probe data in {0}")]
    Malformed(String),

    /// No OS-specific probe exists on this platform.
    #[error("no OS memory probe on this platform")]
    Unsupported,
}
