//! Tracing windows over an object space
//!
//! A trace snapshots the objects that already exist, turns on allocation
//! attribution, runs the caller's work, then scans for objects that are new
//! and carry an allocation site.

pub mod process;
pub mod session;

pub use process::{ProcessTrace, REPORT_BANNER};
pub use session::{AllocationStats, TraceBuilder, TraceSession};

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("Object space does not support allocation tracing")]
    Unsupported,

    #[error("Allocation tracing is already active")]
    AlreadyTracing,
}
