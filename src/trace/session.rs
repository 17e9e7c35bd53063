use super::TraceError;
use crate::config::Config;
use crate::data::{AllocationRecord, PathAliases};
use crate::query::AllocationsProxy;
use crate::runtime::{ObjectId, ObjectRef, ObjectSpace};
use fxhash::FxHashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Allocations attributed during one tracing window
///
/// The collected values are kept alive for as long as the stats exist, so
/// records can still inspect them after the traced work has finished.
#[derive(Debug, Clone)]
pub struct AllocationStats {
    records: Vec<AllocationRecord>,
    values: Vec<ObjectRef>,
    elapsed: Duration,
}

impl AllocationStats {
    pub fn builder() -> TraceBuilder {
        TraceBuilder::default()
    }

    /// Trace the allocations made by `block`
    ///
    /// ```
    /// use allocstats::runtime::{Heap, Object};
    /// use allocstats::trace::AllocationStats;
    ///
    /// let heap = Heap::new();
    /// let stats = AllocationStats::trace(&heap, || {
    ///     heap.alloc(Object::str("hello"), allocstats::site!());
    /// })
    /// .unwrap();
    /// assert_eq!(stats.len(), 1);
    /// ```
    pub fn trace<S, F>(space: &S, block: F) -> Result<Self, TraceError>
    where
        S: ObjectSpace + ?Sized,
        F: FnMut(),
    {
        Self::builder().trace(space, block)
    }

    /// Begin an explicit tracing window, ended by [`TraceSession::stop`]
    pub fn start<S>(space: &S) -> Result<TraceSession<'_, S>, TraceError>
    where
        S: ObjectSpace + ?Sized,
    {
        Self::builder().start(space)
    }

    pub fn records(&self) -> &[AllocationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Wall time between the start and the end of the tracing window
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Query over the collected records
    pub fn allocations(&self, alias_paths: bool) -> AllocationsProxy<'_> {
        AllocationsProxy::new(&self.records, alias_paths)
    }

    /// Number of collected values that are still alive
    pub fn retained_values(&self) -> usize {
        self.values.len()
    }
}

/// Options for a tracing window
#[derive(Debug, Clone, Default)]
pub struct TraceBuilder {
    burn: usize,
    aliases: Option<PathAliases>,
}

impl TraceBuilder {
    /// Run the block this many times untraced before the traced run, so
    /// one-time lazy allocations are not attributed to it
    pub fn burn(mut self, runs: usize) -> Self {
        self.burn = runs;
        self
    }

    /// Roots used to alias source files. Defaults to the working directory.
    pub fn aliases(mut self, aliases: PathAliases) -> Self {
        self.aliases = Some(aliases);
        self
    }

    pub fn trace<S, F>(self, space: &S, mut block: F) -> Result<AllocationStats, TraceError>
    where
        S: ObjectSpace + ?Sized,
        F: FnMut(),
    {
        for _ in 0..self.burn {
            block();
        }
        if self.burn > 0 {
            debug!(runs = self.burn, "finished burn-in runs");
        }

        let session = self.start(space)?;
        block();
        Ok(session.stop())
    }

    pub fn start<S>(self, space: &S) -> Result<TraceSession<'_, S>, TraceError>
    where
        S: ObjectSpace + ?Sized,
    {
        let existing: FxHashSet<ObjectId> =
            space.live_objects().iter().map(|object| object.id).collect();
        space.begin_tracing()?;

        let aliases = self
            .aliases
            .unwrap_or_else(|| PathAliases::detect(&Config::default()));

        debug!(existing = existing.len(), "allocation tracing started");

        Ok(TraceSession {
            space,
            existing,
            aliases: Arc::new(aliases),
            started: Instant::now(),
            active: true,
        })
    }
}

/// An open tracing window. Dropping it without [`stop`](Self::stop) ends
/// tracing and discards what was attributed.
pub struct TraceSession<'s, S: ObjectSpace + ?Sized> {
    space: &'s S,
    /// Objects alive before tracing began
    existing: FxHashSet<ObjectId>,
    aliases: Arc<PathAliases>,
    started: Instant,
    active: bool,
}

impl<'s, S: ObjectSpace + ?Sized> TraceSession<'s, S> {
    /// End the window and collect every new object with an allocation site
    pub fn stop(mut self) -> AllocationStats {
        self.space.stop_tracing();
        let elapsed = self.started.elapsed();

        let mut records = Vec::new();
        let mut values = Vec::new();
        let mut unattributed = 0usize;

        for object in self.space.live_objects() {
            if self.existing.contains(&object.id) {
                continue;
            }
            let Some(site) = self.space.allocation_site(object.id) else {
                unattributed += 1;
                continue;
            };

            let retained_bytes = self.space.shallow_size(&object);
            records.push(AllocationRecord::new(
                &object.value,
                retained_bytes,
                site,
                Arc::clone(&self.aliases),
            ));
            values.push(object.value);
        }

        self.space.clear_tracing_state();
        self.active = false;

        info!(
            allocations = records.len(),
            skipped = unattributed,
            elapsed_us = elapsed.as_micros() as u64,
            "allocation tracing stopped"
        );

        AllocationStats {
            records,
            values,
            elapsed,
        }
    }
}

impl<'s, S: ObjectSpace + ?Sized> Drop for TraceSession<'s, S> {
    fn drop(&mut self) {
        if self.active {
            self.space.stop_tracing();
            self.space.clear_tracing_state();
        }
    }
}
