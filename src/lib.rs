//! allocstats: object allocation tracing reports
//!
//! Traces the allocations made by a unit of work against a host object space,
//! snapshots each new live object as an [`AllocationRecord`], and answers
//! questions about them through a chainable, lazily resolved query.
//!
//! # Features
//!
//! - **Tracing windows**: closure or explicit start/stop, with burn-in runs
//! - **Chainable queries**: file filters, attribute equality, GROUP BY, sort
//!   by group size, minimum group size, byte sums
//! - **Path aliasing**: `<PWD>`, `<LIBDIR>`, `<PKG:name>` short forms
//! - **Rendering**: fixed-width text tables and JSON
//! - **Top sites**: bounded cross-run ranking of the busiest allocation sites
//!
//! # Example
//!
//! ```
//! use allocstats::runtime::{Heap, Object};
//! use allocstats::trace::AllocationStats;
//!
//! let heap = Heap::new();
//! let stats = AllocationStats::trace(&heap, || {
//!     heap.alloc(Object::Hash(Vec::new()), allocstats::site!());
//!     heap.alloc(Object::str("key"), allocstats::site!());
//! })
//! .unwrap();
//!
//! let report = stats
//!     .allocations(true)
//!     .group_by(["source_file", "source_line", "type_name"])
//!     .sort_by_size()
//!     .to_text()
//!     .unwrap();
//! println!("{}", report);
//! ```

pub mod config;
pub mod data;
pub mod query;
pub mod render;
pub mod runtime;
pub mod sites;
pub mod trace;

// Re-export commonly used types
pub use config::{Config, ConfigError, ReportFormat};
pub use data::{AllocationRecord, Attribute, PathAliases, Value};
pub use query::{AllocationsProxy, QueryError, Resolved};
pub use sites::{HookError, TopSites};
pub use trace::{AllocationStats, ProcessTrace, TraceError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
