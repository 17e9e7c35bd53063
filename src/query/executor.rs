//! Chainable allocations query
//!
//! [`AllocationsProxy`] collects transforms without touching the records.
//! Nothing is evaluated until [`AllocationsProxy::resolve`], which interprets
//! the plan in a single pass: filters in registration order, then the
//! grouping, then each mapper in registration order. Resolution is not cached.

use super::plan::{FilterPlan, GroupByPlan, MapperPlan, QueryPlan};
use super::result::{Groups, Resolved};
use super::QueryError;
use crate::data::{AllocationRecord, Attribute, GroupKey, Value};
use crate::render;
use fxhash::FxHashMap;

/// Columns shown by [`AllocationsProxy::to_text`]
pub const DEFAULT_COLUMNS: [Attribute; 6] = [
    Attribute::SourceFile,
    Attribute::SourceLine,
    Attribute::TypePath,
    Attribute::MethodName,
    Attribute::RetainedBytes,
    Attribute::TypeName,
];

#[derive(Debug, Clone)]
pub struct AllocationsProxy<'a> {
    records: &'a [AllocationRecord],
    /// Working directory at construction time
    working_dir: Option<String>,
    plan: QueryPlan,
}

impl<'a> AllocationsProxy<'a> {
    pub fn new(records: &'a [AllocationRecord], alias_paths: bool) -> Self {
        let working_dir = std::env::current_dir()
            .ok()
            .and_then(|dir| dir.to_str().map(str::to_string));
        Self {
            records,
            working_dir,
            plan: QueryPlan::new(alias_paths),
        }
    }

    /// Override the working directory used by [`from_working_dir`](Self::from_working_dir)
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn is_aliasing_paths(&self) -> bool {
        self.plan.alias_paths
    }

    pub fn alias_paths(mut self, alias_paths: bool) -> Self {
        self.plan.alias_paths = alias_paths;
        self
    }

    /// Keep records whose source file contains `pattern`
    pub fn from(mut self, pattern: impl Into<String>) -> Self {
        self.plan.filters.push(FilterPlan::FileContains(pattern.into()));
        self
    }

    /// Keep records whose source file does not contain `pattern`
    pub fn not_from(mut self, pattern: impl Into<String>) -> Self {
        self.plan
            .filters
            .push(FilterPlan::FileNotContains(pattern.into()));
        self
    }

    /// Keep records allocated under the working directory
    pub fn from_working_dir(mut self) -> Self {
        self.plan
            .filters
            .push(FilterPlan::WorkingDir(self.working_dir.clone()));
        self
    }

    /// Keep records where every attribute equals the expected value
    ///
    /// ```
    /// # use allocstats::query::AllocationsProxy;
    /// let query = AllocationsProxy::new(&[], false)
    ///     .filter_where([("type_name", "String".into())])
    ///     .group_by(["source_file", "type_name"]);
    /// assert!(query.resolve().unwrap().is_empty());
    /// ```
    pub fn filter_where<A, I>(mut self, conditions: I) -> Self
    where
        A: Into<Attribute>,
        I: IntoIterator<Item = (A, Value)>,
    {
        let conditions = conditions
            .into_iter()
            .map(|(attribute, value)| (attribute.into(), value))
            .collect();
        self.plan.filters.push(FilterPlan::Where(conditions));
        self
    }

    /// Group by one or more attributes, replacing any previous grouping
    pub fn group_by<A, I>(mut self, attributes: I) -> Self
    where
        A: Into<Attribute>,
        I: IntoIterator<Item = A>,
    {
        self.plan.group_by = Some(GroupByPlan {
            attributes: attributes.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Order groups by descending record count
    pub fn sort_by_size(mut self) -> Self {
        self.plan.mappers.push(MapperPlan::SortBySize);
        self
    }

    pub fn sort_by_count(self) -> Self {
        self.sort_by_size()
    }

    /// Drop groups with fewer than `count` records
    pub fn at_least(mut self, count: usize) -> Self {
        self.plan.mappers.push(MapperPlan::AtLeast(count));
        self
    }

    /// Map records to retained bytes, or groups to their byte sums
    pub fn bytes(mut self) -> Self {
        self.plan.mappers.push(MapperPlan::Bytes);
        self
    }

    /// Apply every registered transform
    pub fn resolve(&self) -> Result<Resolved<'a>, QueryError> {
        let alias_paths = self.plan.alias_paths;

        let mut records: Vec<&'a AllocationRecord> = self.records.iter().collect();
        for filter in &self.plan.filters {
            records.retain(|record| filter.matches(record, alias_paths));
        }

        let mut result = match &self.plan.group_by {
            Some(group_by) => Resolved::Groups(group_records(records, group_by, alias_paths)?),
            None => Resolved::Records(records),
        };

        for mapper in &self.plan.mappers {
            result = apply_mapper(result, *mapper)?;
        }

        tracing::debug!(
            input = self.records.len(),
            filters = self.plan.filters.len(),
            grouped = self.plan.group_by.is_some(),
            mappers = self.plan.mappers.len(),
            shape = result.shape(),
            output = result.len(),
            "resolved allocations query"
        );

        Ok(result)
    }

    pub fn all(&self) -> Result<Resolved<'a>, QueryError> {
        self.resolve()
    }

    /// Resolve and render as fixed-width text with the default columns
    pub fn to_text(&self) -> Result<String, QueryError> {
        self.to_text_with_columns(&DEFAULT_COLUMNS)
    }

    pub fn to_text_with_columns(&self, columns: &[Attribute]) -> Result<String, QueryError> {
        let resolved = self.resolve()?;
        Ok(render::text::render(&resolved, columns, self.plan.alias_paths))
    }

    /// Resolve and render as a JSON string
    pub fn to_json(&self) -> Result<String, QueryError> {
        let resolved = self.resolve()?;
        Ok(render::json::to_string(&resolved)?)
    }
}

fn group_records<'a>(
    records: Vec<&'a AllocationRecord>,
    group_by: &GroupByPlan,
    alias_paths: bool,
) -> Result<Groups<Vec<&'a AllocationRecord>>, QueryError> {
    if group_by.attributes.is_empty() {
        return Err(QueryError::EmptyGrouping);
    }

    // Key -> position in `entries`, so groups keep first-encounter order
    let mut index: FxHashMap<GroupKey, usize> = FxHashMap::default();
    let mut entries: Vec<(GroupKey, Vec<&'a AllocationRecord>)> = Vec::new();

    for record in records {
        let key: GroupKey = group_by
            .attributes
            .iter()
            .map(|attribute| record.attribute(attribute, alias_paths))
            .collect();

        match index.get(&key) {
            Some(&pos) => entries[pos].1.push(record),
            None => {
                index.insert(key.clone(), entries.len());
                entries.push((key, vec![record]));
            }
        }
    }

    Ok(Groups::new(group_by.attributes.clone(), entries))
}

fn apply_mapper<'a>(result: Resolved<'a>, mapper: MapperPlan) -> Result<Resolved<'a>, QueryError> {
    match (mapper, result) {
        (MapperPlan::SortBySize, Resolved::Groups(mut groups)) => {
            groups.sort_by_key(|(_, records)| std::cmp::Reverse(records.len()));
            Ok(Resolved::Groups(groups))
        }
        (MapperPlan::SortBySize, Resolved::Records(_)) => Err(QueryError::RequiresGrouping {
            mapper: mapper.name(),
        }),

        (MapperPlan::AtLeast(count), Resolved::Groups(mut groups)) => {
            groups.retain(|(_, records)| records.len() >= count);
            Ok(Resolved::Groups(groups))
        }
        // Ungrouped results have no group sizes to test
        (MapperPlan::AtLeast(_), flat @ (Resolved::Records(_) | Resolved::Bytes(_))) => Ok(flat),

        (MapperPlan::Bytes, Resolved::Records(records)) => Ok(Resolved::Bytes(
            records.iter().map(|r| r.retained_bytes()).collect(),
        )),
        (MapperPlan::Bytes, Resolved::Groups(groups)) => Ok(Resolved::GroupBytes(
            groups.map_values(|records| records.iter().map(|r| r.retained_bytes()).sum()),
        )),

        (mapper, other) => Err(QueryError::InvalidShape {
            mapper: mapper.name(),
            shape: other.shape(),
        }),
    }
}
