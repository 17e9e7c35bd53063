//! Cross-run ranking of allocation sites

pub mod hook;
pub mod ranker;

pub use hook::{HookConfig, HookError, TestTracer};
pub use ranker::{Site, TopSites, MAX_SITE_HISTORY};
