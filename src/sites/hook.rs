//! Per-test allocation tracing
//!
//! Test harnesses have no around-hooks, so each test body is wrapped
//! explicitly:
//!
//! ```no_run
//! use allocstats::runtime::{Heap, Object};
//! use allocstats::sites::hook::{self, HookConfig};
//!
//! let heap = Heap::new();
//! hook::install(HookConfig::default()).unwrap();
//! hook::trace_test_here(&heap, || {
//!     heap.alloc(Object::str("fixture"), allocstats::site!());
//! })
//! .unwrap();
//! hook::report();
//! ```
//!
//! A [`TestTracer`] runs one traced test at a time, so tests sharing a heap
//! through the same tracer may run on parallel harness threads. Allocations
//! made on that heap by code outside the tracer while a test is traced are
//! still attributed to that test.

use super::ranker::TopSites;
use crate::config::{Config, DEFAULT_TOP_SITES_LIMIT};
use crate::data::Attribute;
use crate::query::QueryError;
use crate::runtime::ObjectSpace;
use crate::trace::{AllocationStats, TraceError};
use parking_lot::Mutex;
use std::panic::Location;
use std::sync::OnceLock;
use tracing::debug;

/// Source paths of the test harness and toolchain, never ranked
pub const DEFAULT_IGNORED_PATHS: [&str; 2] = ["/rustc/", "/library/test/"];

#[derive(Debug, Clone)]
pub struct HookConfig {
    pub limit: usize,
    /// Allocations from files containing any of these are dropped
    pub ignored_paths: Vec<String>,
    /// Untraced runs of each test before the traced one
    pub burn: usize,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_TOP_SITES_LIMIT,
            ignored_paths: DEFAULT_IGNORED_PATHS.iter().map(|p| p.to_string()).collect(),
            burn: 1,
        }
    }
}

impl HookConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            limit: config.top_sites_limit,
            ..Self::default()
        }
    }

    pub fn with_ignored_path(mut self, path: impl Into<String>) -> Self {
        self.ignored_paths.push(path.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Allocation hook is not installed; call hook::install first")]
    NotInstalled,

    #[error("Allocation hook is already installed")]
    AlreadyInstalled,

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),
}

/// Traces test bodies and ranks their allocation sites
#[derive(Debug)]
pub struct TestTracer {
    config: HookConfig,
    /// Held from the first burn run until the sites are merged
    running: Mutex<()>,
    sites: Mutex<TopSites>,
}

impl TestTracer {
    pub fn new(config: HookConfig) -> Self {
        let sites = Mutex::new(TopSites::new(config.limit));
        Self {
            config,
            running: Mutex::new(()),
            sites,
        }
    }

    /// Trace one test body and merge its sites under `label`
    pub fn trace_test<S, F>(&self, space: &S, label: &str, test: F) -> Result<(), HookError>
    where
        S: ObjectSpace + ?Sized,
        F: FnMut(),
    {
        let _running = self.running.lock();
        let stats = AllocationStats::builder()
            .burn(self.config.burn)
            .trace(space, test)?;

        let query = self
            .config
            .ignored_paths
            .iter()
            .fold(stats.allocations(true), |query, path| query.not_from(path.as_str()))
            .group_by([Attribute::SourceFile, Attribute::SourceLine, Attribute::TypeName])
            .sort_by_size();

        let resolved = query.resolve()?;
        if let Some(groups) = resolved.as_groups() {
            debug!(label, groups = groups.len(), "merging test allocation sites");
            self.sites.lock().merge_groups(groups, label);
        }
        Ok(())
    }

    pub fn top_sites(&self) -> TopSites {
        self.sites.lock().clone()
    }

    pub fn top_sites_text(&self) -> String {
        self.sites.lock().render()
    }
}

static HOOK: OnceLock<TestTracer> = OnceLock::new();

/// Install the process-wide tracer
pub fn install(config: HookConfig) -> Result<(), HookError> {
    HOOK.set(TestTracer::new(config))
        .map_err(|_| HookError::AlreadyInstalled)
}

pub fn is_installed() -> bool {
    HOOK.get().is_some()
}

fn installed() -> Result<&'static TestTracer, HookError> {
    HOOK.get().ok_or(HookError::NotInstalled)
}

/// Trace a test body with the installed tracer
pub fn trace_test<S, F>(space: &S, label: &str, test: F) -> Result<(), HookError>
where
    S: ObjectSpace + ?Sized,
    F: FnMut(),
{
    installed()?.trace_test(space, label, test)
}

/// [`trace_test`] labelled with the caller's `file:line`
#[track_caller]
pub fn trace_test_here<S, F>(space: &S, test: F) -> Result<(), HookError>
where
    S: ObjectSpace + ?Sized,
    F: FnMut(),
{
    let caller = Location::caller();
    let label = format!("./{}:{}", caller.file(), caller.line());
    trace_test(space, &label, test)
}

/// Rendered ranking of the installed tracer; empty if not installed
pub fn top_sites_text() -> String {
    HOOK.get().map(TestTracer::top_sites_text).unwrap_or_default()
}

/// Print the ranking to stdout
pub fn report() {
    let text = top_sites_text();
    if !text.is_empty() {
        print!("{}", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Heap, Object, ObjectRef};
    use crate::site;
    use std::sync::Arc;

    #[test]
    fn test_tracer_ranks_sites() {
        let heap = Heap::new();
        let tracer = TestTracer::new(HookConfig::default());

        let line = line!() + 4;
        tracer
            .trace_test(&heap, "./tests/strings.rs:10", || {
                let items: Vec<ObjectRef> = (0..3)
                    .map(|i| heap.alloc(Object::str(i.to_string()), site!()) as ObjectRef)
                    .collect();
                heap.alloc(Object::Array(items), site!());
            })
            .unwrap();

        let text = tracer.top_sites_text();
        let file = format!("<PWD>/{}", file!());
        assert!(text.starts_with("Top 2 allocation sites:\n"));
        assert!(text.contains(&format!("  String allocations at {}:{}\n", file, line)));
        assert!(text.contains("    3 allocations during ./tests/strings.rs:10\n"));
        assert!(text.contains(&format!("  Array allocations at {}:{}\n", file, line + 2)));
        assert!(text.contains("    1 allocations during ./tests/strings.rs:10\n"));
    }

    #[test]
    fn test_ignored_paths_not_ranked() {
        let heap = Heap::new();
        let tracer = TestTracer::new(HookConfig::default().with_ignored_path("src/sites"));

        tracer
            .trace_test(&heap, "ignored", || {
                heap.alloc(Object::Integer(1), site!());
            })
            .unwrap();
        assert!(tracer.top_sites().is_empty());
        assert_eq!(tracer.top_sites_text(), "");
    }

    #[test]
    fn test_tracer_accumulates_across_tests() {
        let heap = Heap::new();
        let tracer = TestTracer::new(HookConfig {
            limit: 1,
            ..HookConfig::default()
        });
        let keep = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second"] {
            tracer
                .trace_test(&heap, label, || {
                    keep.lock().push(heap.alloc(Object::Float(1.0), site!()));
                })
                .unwrap();
        }

        let top = tracer.top_sites();
        assert_eq!(top.len(), 1);
        let labels: Vec<&str> = top.sites()[0].counts().iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["first", "second"]);
    }

    #[test]
    fn test_parallel_tests_share_heap_and_tracer() {
        let heap = Heap::new();
        let tracer = TestTracer::new(HookConfig::default());

        std::thread::scope(|scope| {
            for n in 1..=4 {
                let (heap, tracer) = (&heap, &tracer);
                scope.spawn(move || {
                    tracer
                        .trace_test(heap, &format!("t{n}"), || {
                            for _ in 0..n {
                                heap.alloc(Object::Integer(n), site!());
                            }
                        })
                        .unwrap();
                });
            }
        });

        let top = tracer.top_sites();
        assert_eq!(top.len(), 1);
        let counts: Vec<(&str, usize)> = top.sites()[0]
            .counts()
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
            .collect();
        assert_eq!(counts, vec![("t4", 4), ("t3", 3), ("t2", 2)]);
    }

    #[test]
    fn test_unsupported_space_reported() {
        let heap = Heap::unsupported();
        let tracer = TestTracer::new(HookConfig::default());
        let result = tracer.trace_test(&heap, "x", || {});
        assert!(matches!(result, Err(HookError::Trace(TraceError::Unsupported))));
    }

    // The only test touching the process-wide hook
    #[test]
    fn test_global_hook_lifecycle() {
        let heap = Heap::new();
        assert!(matches!(
            trace_test(&heap, "early", || {}),
            Err(HookError::NotInstalled)
        ));
        assert_eq!(top_sites_text(), "");

        install(HookConfig::from_config(&Config::default())).unwrap();
        assert!(is_installed());
        assert!(matches!(
            install(HookConfig::default()),
            Err(HookError::AlreadyInstalled)
        ));

        let expected_label = format!("./{}:{}", file!(), line!() + 1);
        trace_test_here(&heap, || {
            heap.alloc(Object::str("global"), site!());
        })
        .unwrap();

        assert!(top_sites_text().contains(&format!("allocations during {}\n", expected_label)));
    }
}
