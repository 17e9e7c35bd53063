//! Whole-process trace mode
//!
//! Enabled with `ALLOCSTATS_TRACE_PROCESS`. Tracing starts as early as the
//! host calls [`ProcessTrace::from_env`] and ends at [`ProcessTrace::finish`],
//! which is meant to run on the way out of `main`.

use super::session::{AllocationStats, TraceSession};
use super::TraceError;
use crate::config::Config;
use crate::data::PathAliases;
use crate::runtime::ObjectSpace;
use tracing::info;

pub const REPORT_BANNER: &str = "Object Allocation Report\n------------------------";

pub struct ProcessTrace<'s, S: ObjectSpace + ?Sized> {
    session: TraceSession<'s, S>,
}

impl<'s, S: ObjectSpace + ?Sized> ProcessTrace<'s, S> {
    /// Start tracing `space` if the configuration asks for it
    pub fn from_env(space: &'s S, config: &Config) -> Result<Option<Self>, TraceError> {
        if !config.trace_process {
            return Ok(None);
        }

        let session = AllocationStats::builder()
            .aliases(PathAliases::detect(config))
            .start(space)?;
        info!("whole-process allocation tracing enabled");

        Ok(Some(Self { session }))
    }

    /// Stop tracing and return the banner followed by the caller's report
    pub fn finish<F, E>(self, report: F) -> Result<String, E>
    where
        F: FnOnce(&AllocationStats) -> Result<String, E>,
    {
        let stats = self.session.stop();
        let body = report(&stats)?;
        Ok(format!("{}\n{}", REPORT_BANNER, body))
    }
}
