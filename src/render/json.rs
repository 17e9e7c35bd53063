use crate::data::{AllocationRecord, Attribute, GroupKey, Value};
use crate::query::{Groups, Resolved};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
struct RecordJson<'a> {
    retained_bytes: u64,
    type_path: Option<&'a str>,
    method_name: Option<&'a str>,
    file: Option<String>,
    file_raw: Option<&'a str>,
    line: Option<u32>,
    type_name: &'a str,
    type_descriptor: String,
}

impl<'a> From<&'a AllocationRecord> for RecordJson<'a> {
    fn from(record: &'a AllocationRecord) -> Self {
        Self {
            retained_bytes: record.retained_bytes(),
            type_path: record.type_path(),
            method_name: record.method_name(),
            file: record.aliased_source_file().map(|f| f.into_owned()),
            file_raw: record.source_file(),
            line: record.source_line(),
            type_name: record.type_name(),
            type_descriptor: record.type_descriptor(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GroupJson<'a, T> {
    key: BTreeMap<&'a str, &'a Value>,
    #[serde(flatten)]
    value: T,
}

#[derive(Debug, Serialize)]
struct GroupRecords<'a> {
    records: Vec<RecordJson<'a>>,
}

#[derive(Debug, Serialize)]
struct GroupBytes {
    bytes: u64,
}

fn key_object<'a>(attributes: &'a [Attribute], key: &'a GroupKey) -> BTreeMap<&'a str, &'a Value> {
    attributes
        .iter()
        .map(Attribute::as_str)
        .zip(key.iter())
        .collect()
}

fn groups_json<'a, T, U>(
    groups: &'a Groups<T>,
    value: impl Fn(&'a T) -> U,
) -> Vec<GroupJson<'a, U>> {
    groups
        .iter()
        .map(|(key, v)| GroupJson {
            key: key_object(groups.attributes(), key),
            value: value(v),
        })
        .collect()
}

/// Serialize a resolved result as a JSON string
pub fn to_string(resolved: &Resolved<'_>) -> Result<String, serde_json::Error> {
    match resolved {
        Resolved::Records(records) => {
            let rows: Vec<RecordJson<'_>> = records.iter().map(|r| RecordJson::from(*r)).collect();
            serde_json::to_string(&rows)
        }
        Resolved::Bytes(bytes) => serde_json::to_string(bytes),
        Resolved::Groups(groups) => serde_json::to_string(&groups_json(groups, |records| {
            GroupRecords {
                records: records.iter().map(|r| RecordJson::from(*r)).collect(),
            }
        })),
        Resolved::GroupBytes(groups) => {
            serde_json::to_string(&groups_json(groups, |bytes| GroupBytes { bytes: *bytes }))
        }
    }
}
