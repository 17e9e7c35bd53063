//! allocstats demo
//!
//! Run with: cargo run
//!
//! Traces a small workload on an in-process heap and prints its allocation
//! sites, grouped by file, line and type and sorted by count.
//!
//! Environment variables:
//! - ALLOCSTATS_TRACE_PROCESS: trace the whole run and print the banner report
//! - ALLOCSTATS_LIBRARY_DIR / ALLOCSTATS_PACKAGE_DIR: extra alias roots
//! - ALLOCSTATS_ALIAS_PATHS: alias source files (default: true)
//! - ALLOCSTATS_FORMAT: text or json (default: text)
//! - ALLOCSTATS_REPORT_PATH: also write the report to this file
//! - RUST_LOG: Log level (default: info)

use allocstats::runtime::{Heap, Instance, Object, ObjectRef};
use allocstats::{
    site, AllocationStats, Attribute, Config, PathAliases, ProcessTrace, QueryError, ReportFormat,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WORDS: &[&str] = &["alpha", "beta", "gamma", "delta", "alpha", "beta"];

/// Index a few words the way an application would: a hash of word -> count,
/// plus the scratch strings and arrays built along the way
fn build_index(heap: &Heap) -> Arc<Object> {
    let mut entries: Vec<(ObjectRef, ObjectRef)> = Vec::new();

    for word in WORDS {
        let key = heap.alloc(
            Object::str(*word),
            site!().in_type("WordIndex").in_method("build_index"),
        );
        let count = heap.alloc(
            Object::Integer(word.len() as i64),
            site!().in_type("WordIndex").in_method("build_index"),
        );
        entries.push((key as ObjectRef, count as ObjectRef));
    }

    let _letters = heap.alloc(
        Object::Array(Object::integers(&[1, 2, 3, 4, 5])),
        site!().in_type("WordIndex").in_method("build_index"),
    );
    let _owner = heap.alloc(
        Object::Instance(Instance::new("WordIndex").with_field("size", WORDS.len())),
        site!().in_type("WordIndex").in_method("new"),
    );

    heap.alloc(
        Object::Hash(entries),
        site!().in_type("WordIndex").in_method("build_index"),
    )
}

fn render_report(stats: &AllocationStats, config: &Config) -> Result<String, QueryError> {
    let query = stats
        .allocations(config.alias_paths)
        .group_by([Attribute::SourceFile, Attribute::SourceLine, Attribute::TypeName])
        .sort_by_size();

    match config.format {
        ReportFormat::Text => query.to_text(),
        ReportFormat::Json => query.to_json(),
    }
}

fn emit(report: &str, config: &Config) -> Result<(), allocstats::Error> {
    println!("{}", report);
    if let Some(path) = &config.report_path {
        std::fs::write(path, report)?;
        tracing::info!(path = %path.display(), "report written");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "allocstats=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("allocstats configuration:");
    tracing::info!("  Process trace: {}", config.trace_process);
    tracing::info!("  Alias paths: {}", config.alias_paths);
    tracing::info!("  Format: {:?}", config.format);
    if let Some(dir) = &config.library_dir {
        tracing::info!("  Library dir: {}", dir.display());
    }
    if let Some(dir) = &config.package_dir {
        tracing::info!("  Package dir: {}", dir.display());
    }

    println!(
        "allocstats {}: object allocation tracing reports\n",
        env!("CARGO_PKG_VERSION")
    );

    let heap = Heap::new();

    if let Some(process) = ProcessTrace::from_env(&heap, &config)? {
        let _index = build_index(&heap);
        let report = process.finish(|stats| render_report(stats, &config))?;
        emit(&report, &config)?;
        return Ok(());
    }

    let stats = AllocationStats::builder()
        .aliases(PathAliases::detect(&config))
        .trace(&heap, || {
            build_index(&heap);
        })?;

    let report = render_report(&stats, &config)?;
    emit(&report, &config)?;

    Ok(())
}
