use allocstats::data::{AllocationRecord, Attribute};
use allocstats::query::{AllocationsProxy, QueryError};
use allocstats::runtime::{AllocationSite, Heap, Instance, Object, ObjectRef};
use allocstats::trace::AllocationStats;
use std::sync::Arc;
use std::time::{Duration, Instant};

const FILES: &[&str] = &[
    "/srv/app/src/parser.rs",
    "/srv/app/src/lexer.rs",
    "/srv/app/src/eval.rs",
    "/srv/app/src/cache.rs",
    "/srv/app/tests/fixtures.rs",
    "/usr/lib/std/collections.rs",
    "/opt/packages/packages/serde_lite/src/de.rs",
];
const METHODS: &[&str] = &["parse", "next_token", "eval", "lookup", "build", "clone", "new"];
const TYPES: &[&str] = &["Parser", "Lexer", "Interpreter", "Cache", "Fixture"];

fn fast_random(seed: &mut u64) -> u64 {
    *seed ^= *seed << 13;
    *seed ^= *seed >> 7;
    *seed ^= *seed << 17;
    *seed
}

fn random_object(seed: &mut u64) -> Object {
    match fast_random(seed) % 5 {
        0 => Object::Integer(fast_random(seed) as i64 % 1000),
        1 => Object::str("x".repeat(1 + fast_random(seed) as usize % 48)),
        2 => {
            let len = fast_random(seed) as usize % 6;
            Object::Array(
                (0..len)
                    .map(|i| Arc::new(Object::Integer(i as i64)) as ObjectRef)
                    .collect(),
            )
        }
        3 => Object::Hash(Vec::new()),
        _ => Object::Instance(
            Instance::new(TYPES[fast_random(seed) as usize % TYPES.len()])
                .with_field("id", fast_random(seed) as i64 % 100),
        ),
    }
}

fn random_site(seed: &mut u64) -> AllocationSite {
    AllocationSite::new(
        FILES[fast_random(seed) as usize % FILES.len()],
        1 + (fast_random(seed) % 200) as u32,
    )
    .in_type(TYPES[fast_random(seed) as usize % TYPES.len()])
    .in_method(METHODS[fast_random(seed) as usize % METHODS.len()])
}

struct BenchmarkStats {
    total_records: usize,
    total_duration: Duration,
    latencies: Vec<Duration>,
}

impl BenchmarkStats {
    fn records_per_sec(&self) -> f64 {
        self.total_records as f64 / self.total_duration.as_secs_f64()
    }

    fn avg_latency(&self) -> Duration {
        let sum: Duration = self.latencies.iter().sum();
        sum / self.latencies.len().max(1) as u32
    }

    fn min_latency(&self) -> Duration {
        self.latencies.iter().min().copied().unwrap_or_default()
    }

    fn max_latency(&self) -> Duration {
        self.latencies.iter().max().copied().unwrap_or_default()
    }

    fn percentile(&self, pct: usize) -> Duration {
        let mut sorted = self.latencies.clone();
        sorted.sort();
        sorted
            .get(sorted.len() * pct / 100)
            .copied()
            .unwrap_or_default()
    }
}

type Pipeline = for<'a> fn(AllocationsProxy<'a>) -> Result<usize, QueryError>;

fn flat_bytes(query: AllocationsProxy<'_>) -> Result<usize, QueryError> {
    Ok(query.bytes().resolve()?.len())
}

fn top_sites(query: AllocationsProxy<'_>) -> Result<usize, QueryError> {
    Ok(query
        .group_by([Attribute::SourceFile, Attribute::SourceLine, Attribute::TypeName])
        .sort_by_size()
        .resolve()?
        .len())
}

fn filtered_bytes(query: AllocationsProxy<'_>) -> Result<usize, QueryError> {
    Ok(query
        .from("/srv/app")
        .not_from("tests")
        .group_by(["type_descriptor", "method_name"])
        .at_least(5)
        .bytes()
        .resolve()?
        .len())
}

fn render_text(query: AllocationsProxy<'_>) -> Result<usize, QueryError> {
    Ok(query.group_by(["package_name", "type_name"]).to_text()?.len())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let allocations: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100_000);
    let iterations: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(20);

    println!("allocstats Benchmark");
    println!("====================");
    println!("Allocations:     {}", allocations);
    println!("Iterations:      {}", iterations);
    println!();

    let heap = Heap::new();
    let mut seed: u64 = 12345;

    print!("Tracing workload... ");
    std::io::Write::flush(&mut std::io::stdout())?;
    let stats = AllocationStats::trace(&heap, || {
        for _ in 0..allocations {
            let object = random_object(&mut seed);
            let site = random_site(&mut seed);
            heap.alloc(object, site);
        }
    })?;
    println!("done");
    println!("  Records:     {}", stats.len());
    println!("  Trace time:  {:?}", stats.elapsed());
    println!();

    let records: &[AllocationRecord] = stats.records();
    let pipelines: [(&str, Pipeline); 4] = [
        ("flat bytes", flat_bytes),
        ("group file/line/type + sort", top_sites),
        ("filter + group + at_least + bytes", filtered_bytes),
        ("group + render text", render_text),
    ];

    for (name, pipeline) in pipelines {
        print!("Benchmarking {}... ", name);
        std::io::Write::flush(&mut std::io::stdout())?;

        let mut latencies = Vec::with_capacity(iterations);
        let mut output = 0;
        let start = Instant::now();

        for _ in 0..iterations {
            let query = AllocationsProxy::new(records, true);
            let run_start = Instant::now();
            output = pipeline(query)?;
            latencies.push(run_start.elapsed());
        }

        let bench = BenchmarkStats {
            total_records: records.len() * iterations,
            total_duration: start.elapsed(),
            latencies,
        };

        println!("done");
        println!("  Output size: {}", output);
        println!("  Records/sec: {:.0}", bench.records_per_sec());
        println!("  Total time:  {:?}", bench.total_duration);
        println!(
            "  Latency:     avg={:?} min={:?} max={:?}",
            bench.avg_latency(),
            bench.min_latency(),
            bench.max_latency()
        );
        println!(
            "  Percentiles: p50={:?} p99={:?}",
            bench.percentile(50),
            bench.percentile(99)
        );
        println!();
    }

    Ok(())
}
