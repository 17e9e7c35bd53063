use crate::data::{AllocationRecord, Attribute, Value};

/// Deferred transforms of an allocations query, applied in order by the
/// executor: filters, then the grouping, then mappers.
#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    /// Conjunctive filters in registration order
    pub filters: Vec<FilterPlan>,
    /// At most one grouping; a new one replaces the old
    pub group_by: Option<GroupByPlan>,
    /// Post-grouping transforms in registration order
    pub mappers: Vec<MapperPlan>,
    /// Whether source files resolve to their aliased form
    pub alias_paths: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterPlan {
    /// Raw source file contains the pattern
    FileContains(String),
    /// Raw source file does not contain the pattern
    FileNotContains(String),
    /// Raw source file contains the captured working directory; nothing
    /// matches when it could not be determined
    WorkingDir(Option<String>),
    /// Every attribute equals its expected value
    Where(Vec<(Attribute, Value)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupByPlan {
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperPlan {
    /// Order groups by descending record count
    SortBySize,
    /// Drop groups with fewer records
    AtLeast(usize),
    /// Replace records with their retained bytes
    Bytes,
}

impl MapperPlan {
    pub fn name(&self) -> &'static str {
        match self {
            MapperPlan::SortBySize => "sort_by_size",
            MapperPlan::AtLeast(_) => "at_least",
            MapperPlan::Bytes => "bytes",
        }
    }
}

impl FilterPlan {
    pub fn matches(&self, record: &AllocationRecord, alias_paths: bool) -> bool {
        match self {
            FilterPlan::FileContains(pattern) => record
                .source_file()
                .is_some_and(|file| file.contains(pattern.as_str())),
            FilterPlan::FileNotContains(pattern) => !record
                .source_file()
                .is_some_and(|file| file.contains(pattern.as_str())),
            FilterPlan::WorkingDir(dir) => match (dir, record.source_file()) {
                (Some(dir), Some(file)) => file.contains(dir.as_str()),
                _ => false,
            },
            FilterPlan::Where(conditions) => conditions
                .iter()
                .all(|(attribute, expected)| record.attribute(attribute, alias_paths) == *expected),
        }
    }
}

impl QueryPlan {
    pub fn new(alias_paths: bool) -> Self {
        Self {
            alias_paths,
            ..Default::default()
        }
    }

    /// Attributes of the active grouping, if any
    pub fn group_attributes(&self) -> Option<&[Attribute]> {
        self.group_by.as_ref().map(|g| g.attributes.as_slice())
    }
}
