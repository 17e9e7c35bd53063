use crate::data::{AllocationRecord, Attribute, GroupKey};

/// Outcome of resolving an allocations query
#[derive(Debug, Clone)]
pub enum Resolved<'a> {
    /// Filtered records, ungrouped
    Records(Vec<&'a AllocationRecord>),
    /// Retained bytes of each filtered record
    Bytes(Vec<u64>),
    /// Records partitioned by group key
    Groups(Groups<Vec<&'a AllocationRecord>>),
    /// Retained bytes summed per group
    GroupBytes(Groups<u64>),
}

impl<'a> Resolved<'a> {
    /// Short name of the result shape, used in errors and logs
    pub fn shape(&self) -> &'static str {
        match self {
            Resolved::Records(_) => "records",
            Resolved::Bytes(_) => "bytes",
            Resolved::Groups(_) => "groups",
            Resolved::GroupBytes(_) => "group bytes",
        }
    }

    /// Number of records, values or groups
    pub fn len(&self) -> usize {
        match self {
            Resolved::Records(r) => r.len(),
            Resolved::Bytes(b) => b.len(),
            Resolved::Groups(g) => g.len(),
            Resolved::GroupBytes(g) => g.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_records(&self) -> Option<&[&'a AllocationRecord]> {
        match self {
            Resolved::Records(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u64]> {
        match self {
            Resolved::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_groups(&self) -> Option<&Groups<Vec<&'a AllocationRecord>>> {
        match self {
            Resolved::Groups(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_group_bytes(&self) -> Option<&Groups<u64>> {
        match self {
            Resolved::GroupBytes(g) => Some(g),
            _ => None,
        }
    }

    pub fn into_groups(self) -> Option<Groups<Vec<&'a AllocationRecord>>> {
        match self {
            Resolved::Groups(g) => Some(g),
            _ => None,
        }
    }
}

/// Insertion-ordered mapping from group key to a per-group value
#[derive(Debug, Clone, PartialEq)]
pub struct Groups<T> {
    attributes: Vec<Attribute>,
    entries: Vec<(GroupKey, T)>,
}

impl<T> Groups<T> {
    pub fn new(attributes: Vec<Attribute>, entries: Vec<(GroupKey, T)>) -> Self {
        Self {
            attributes,
            entries,
        }
    }

    /// Attributes the keys were built from, in key order
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &[crate::data::Value]) -> Option<&T> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_slice() == key)
            .map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &GroupKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &T)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn entries(&self) -> &[(GroupKey, T)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(GroupKey, T)> {
        self.entries
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&(GroupKey, T)) -> bool) {
        self.entries.retain(keep);
    }

    /// Stable sort of the groups
    pub(crate) fn sort_by_key<K: Ord>(&mut self, key: impl FnMut(&(GroupKey, T)) -> K) {
        self.entries.sort_by_key(key);
    }

    pub(crate) fn map_values<U>(self, mut f: impl FnMut(T) -> U) -> Groups<U> {
        Groups {
            attributes: self.attributes,
            entries: self.entries.into_iter().map(|(k, v)| (k, f(v))).collect(),
        }
    }
}

impl<'a> Groups<Vec<&'a AllocationRecord>> {
    /// Record count per group, in group order
    pub fn counts(&self) -> impl Iterator<Item = (&GroupKey, usize)> {
        self.entries.iter().map(|(k, records)| (k, records.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn groups() -> Groups<u64> {
        Groups::new(
            vec![Attribute::TypeName],
            vec![
                (vec![Value::from("String")], 3),
                (vec![Value::from("Hash")], 1),
                (vec![Value::from("Array")], 3),
            ],
        )
    }

    #[test]
    fn test_lookup_by_key() {
        let g = groups();
        assert_eq!(g.get(&[Value::from("Hash")]), Some(&1));
        assert_eq!(g.get(&[Value::from("Range")]), None);
        assert_eq!(g.len(), 3);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut g = groups();
        g.sort_by_key(|(_, v)| std::cmp::Reverse(*v));
        let keys: Vec<_> = g.keys().map(|k| k[0].to_string()).collect();
        assert_eq!(keys, vec!["String", "Array", "Hash"]);
    }

    #[test]
    fn test_map_values_keeps_order() {
        let mapped = groups().map_values(|v| v * 2);
        assert_eq!(mapped.values().copied().collect::<Vec<_>>(), vec![6, 2, 6]);
        assert_eq!(mapped.attributes(), &[Attribute::TypeName]);
    }

    #[test]
    fn test_resolved_shape() {
        let resolved = Resolved::GroupBytes(groups());
        assert_eq!(resolved.shape(), "group bytes");
        assert_eq!(resolved.len(), 3);
        assert!(resolved.as_records().is_none());
        assert!(resolved.as_group_bytes().is_some());
    }
}
