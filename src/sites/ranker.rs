use crate::config::DEFAULT_TOP_SITES_LIMIT;
use crate::data::{AllocationRecord, GroupKey, Value};
use crate::query::Groups;
use std::cmp::Reverse;
use std::fmt::Write;

/// Counts kept per site, largest first
pub const MAX_SITE_HISTORY: usize = 3;

/// One leaderboard entry: a grouping key and the runs it was largest in
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    key: GroupKey,
    counts: Vec<(String, usize)>,
}

impl Site {
    pub fn key(&self) -> &[Value] {
        &self.key
    }

    /// `(run label, count)` pairs in descending count order
    pub fn counts(&self) -> &[(String, usize)] {
        &self.counts
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().map(|(_, count)| *count).max().unwrap_or(0)
    }

    fn record(&mut self, label: &str, count: usize) {
        let entry = (label.to_string(), count);
        match self.counts.iter().position(|(_, c)| *c < count) {
            Some(idx) => self.counts.insert(idx, entry),
            None => self.counts.push(entry),
        }
        self.counts.truncate(MAX_SITE_HISTORY);
    }
}

/// Bounded ranking of the allocation sites that recur most across runs
#[derive(Debug, Clone)]
pub struct TopSites {
    limit: usize,
    sites: Vec<Site>,
}

impl Default for TopSites {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_SITES_LIMIT)
    }
}

impl TopSites {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            sites: Vec::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Fold one run's group counts into the ranking
    ///
    /// Only the run's `limit` largest groups are considered; history from
    /// earlier runs plays no part in that cut.
    pub fn merge<I>(&mut self, groups: I, label: &str)
    where
        I: IntoIterator<Item = (GroupKey, usize)>,
    {
        let mut incoming: Vec<(usize, GroupKey, usize)> = groups
            .into_iter()
            .enumerate()
            .map(|(pos, (key, count))| (pos, key, count))
            .collect();

        if incoming.len() > self.limit {
            incoming.sort_by_key(|(_, _, count)| Reverse(*count));
            incoming.truncate(self.limit);
            incoming.sort_by_key(|(pos, _, _)| *pos);
        }

        for (_, key, count) in incoming {
            match self.sites.iter_mut().find(|site| site.key == key) {
                Some(site) => site.record(label, count),
                None => self.sites.push(Site {
                    key,
                    counts: vec![(label.to_string(), count)],
                }),
            }
        }

        self.sites.sort_by_key(|site| Reverse(site.max_count()));
        self.sites.truncate(self.limit);
    }

    /// Fold a resolved grouping into the ranking, counting records per group
    pub fn merge_groups(&mut self, groups: &Groups<Vec<&AllocationRecord>>, label: &str) {
        self.merge(
            groups.counts().map(|(key, count)| (key.clone(), count)),
            label,
        );
    }

    /// Human-readable ranking; empty when nothing has been merged
    pub fn render(&self) -> String {
        if self.sites.is_empty() {
            return String::new();
        }

        let mut out = format!("Top {} allocation sites:\n", self.sites.len());
        for site in &self.sites {
            match site.key.as_slice() {
                [file, line, type_name] => {
                    let _ = writeln!(out, "  {} allocations at {}:{}", type_name, file, line);
                }
                key => {
                    let joined: Vec<String> = key.iter().map(ToString::to_string).collect();
                    let _ = writeln!(out, "  allocations at {}", joined.join(", "));
                }
            }
            for (label, count) in &site.counts {
                let _ = writeln!(out, "    {:>3} allocations during {}", count, label);
            }
        }
        out
    }
}
