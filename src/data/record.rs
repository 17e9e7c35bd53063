//! Allocation records and the attribute dispatch used by queries

use super::paths::PathAliases;
use super::value::Value;
use crate::runtime::{AllocationSite, ObjectRef, TracedValue};
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Weak};

/// Most distinct element types spelled out in a sequence descriptor
const MAX_DESCRIBED_ELEMENT_TYPES: usize = 3;

/// An attribute a query can filter, group or tabulate by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Attribute {
    SourceFile,
    SourceLine,
    TypePath,
    MethodName,
    RetainedBytes,
    TypeName,
    TypeDescriptor,
    PackageName,
    /// Forwarded to the allocated value's own accessors
    Value(String),
}

impl Attribute {
    pub fn as_str(&self) -> &str {
        match self {
            Attribute::SourceFile => "source_file",
            Attribute::SourceLine => "source_line",
            Attribute::TypePath => "type_path",
            Attribute::MethodName => "method_name",
            Attribute::RetainedBytes => "retained_bytes",
            Attribute::TypeName => "type_name",
            Attribute::TypeDescriptor => "type_descriptor",
            Attribute::PackageName => "package_name",
            Attribute::Value(name) => name,
        }
    }

    /// Right-justified in tabular output
    pub fn is_numeric(&self) -> bool {
        matches!(self, Attribute::SourceLine | Attribute::RetainedBytes)
    }
}

impl From<&str> for Attribute {
    fn from(name: &str) -> Self {
        match name {
            "source_file" | "file" => Attribute::SourceFile,
            "source_line" | "line" => Attribute::SourceLine,
            "type_path" | "class_path" => Attribute::TypePath,
            "method_name" | "method_id" => Attribute::MethodName,
            "retained_bytes" | "memsize" => Attribute::RetainedBytes,
            "type_name" | "class" => Attribute::TypeName,
            "type_descriptor" | "class_plus" => Attribute::TypeDescriptor,
            "package_name" | "gem" => Attribute::PackageName,
            other => Attribute::Value(other.to_string()),
        }
    }
}

impl From<String> for Attribute {
    fn from(name: String) -> Self {
        Attribute::from(name.as_str())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one allocated object's allocation metadata
///
/// Only a weak reference to the object is kept; the record never keeps the
/// object alive.
#[derive(Clone)]
pub struct AllocationRecord {
    retained_bytes: u64,
    source_file: Option<String>,
    source_line: Option<u32>,
    type_path: Option<String>,
    method_name: Option<String>,
    type_name: String,
    value: Weak<dyn TracedValue>,
    aliases: Arc<PathAliases>,
}

impl AllocationRecord {
    pub fn new(
        value: &ObjectRef,
        retained_bytes: u64,
        site: AllocationSite,
        aliases: Arc<PathAliases>,
    ) -> Self {
        Self {
            retained_bytes,
            source_file: site.file,
            source_line: site.line,
            type_path: site.type_path,
            method_name: site.method_name,
            type_name: value.type_name().to_string(),
            value: Arc::downgrade(value),
            aliases,
        }
    }

    pub fn retained_bytes(&self) -> u64 {
        self.retained_bytes
    }

    /// Raw source file of the allocation
    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    /// Source file with a known root replaced by a short tag
    pub fn aliased_source_file(&self) -> Option<Cow<'_, str>> {
        self.source_file
            .as_deref()
            .map(|file| self.aliases.alias(file))
    }

    /// Raw or aliased source file
    pub fn source_file_as(&self, alias_paths: bool) -> Option<Cow<'_, str>> {
        if alias_paths {
            self.aliased_source_file()
        } else {
            self.source_file.as_deref().map(Cow::Borrowed)
        }
    }

    pub fn source_line(&self) -> Option<u32> {
        self.source_line
    }

    pub fn type_path(&self) -> Option<&str> {
        self.type_path.as_deref()
    }

    pub fn method_name(&self) -> Option<&str> {
        self.method_name.as_deref()
    }

    /// Runtime type name captured when the record was built
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The allocated value, if it is still alive
    pub fn value(&self) -> Option<ObjectRef> {
        self.value.upgrade()
    }

    pub fn type_descriptor(&self) -> String {
        match self.value.upgrade() {
            Some(value) => describe_type(value.as_ref()),
            None => self.type_name.clone(),
        }
    }

    pub fn package_name(&self) -> Option<String> {
        self.source_file
            .as_deref()
            .and_then(|file| self.aliases.package_name(file))
    }

    /// Re-measure the value. Returns false if it has been collected.
    pub fn refresh_retained_bytes(&mut self) -> bool {
        match self.value.upgrade() {
            Some(value) => {
                self.retained_bytes = value.shallow_size();
                true
            }
            None => false,
        }
    }

    /// Resolve an attribute against the record, falling back to the value
    pub fn attribute(&self, attribute: &Attribute, alias_paths: bool) -> Value {
        match attribute {
            Attribute::SourceFile => self
                .source_file_as(alias_paths)
                .map(|file| Value::String(file.into_owned()))
                .unwrap_or(Value::Null),
            Attribute::SourceLine => Value::from(self.source_line),
            Attribute::TypePath => Value::from(self.type_path()),
            Attribute::MethodName => Value::from(self.method_name()),
            Attribute::RetainedBytes => Value::from(self.retained_bytes),
            Attribute::TypeName => Value::from(self.type_name()),
            Attribute::TypeDescriptor => Value::String(self.type_descriptor()),
            Attribute::PackageName => Value::from(self.package_name()),
            Attribute::Value(name) => self
                .value
                .upgrade()
                .and_then(|value| value.attribute(name))
                .unwrap_or(Value::Null),
        }
    }
}

impl fmt::Debug for AllocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationRecord")
            .field("retained_bytes", &self.retained_bytes)
            .field("source_file", &self.source_file)
            .field("source_line", &self.source_line)
            .field("type_path", &self.type_path)
            .field("method_name", &self.method_name)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Type name, with element types spelled out for sequence-like values
///
/// `Sequence<A,B>` lists distinct element types in first-seen order. Empty
/// sequences and those with more than three element types are plain
/// `Sequence`.
pub fn describe_type(value: &dyn TracedValue) -> String {
    let Some(element_types) = value.element_type_names() else {
        return value.type_name().to_string();
    };

    let mut distinct: Vec<String> = Vec::new();
    for name in element_types {
        if !distinct.contains(&name) {
            distinct.push(name);
            if distinct.len() > MAX_DESCRIBED_ELEMENT_TYPES {
                break;
            }
        }
    }

    if distinct.is_empty() || distinct.len() > MAX_DESCRIBED_ELEMENT_TYPES {
        "Sequence".to_string()
    } else {
        format!("Sequence<{}>", distinct.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Instance, Object};
    use std::path::Path;

    fn record_for(value: &ObjectRef, site: AllocationSite) -> AllocationRecord {
        let aliases = PathAliases::none()
            .with_working_dir(Some(Path::new("/work")))
            .with_package_dir(Some(Path::new("/pkgs")));
        AllocationRecord::new(value, value.shallow_size(), site, Arc::new(aliases))
    }

    fn array(items: Vec<Object>) -> ObjectRef {
        Arc::new(Object::Array(
            items.into_iter().map(|o| Arc::new(o) as ObjectRef).collect(),
        ))
    }

    #[test]
    fn test_descriptor_plain_type() {
        let value: ObjectRef = Arc::new(Object::Hash(Vec::new()));
        assert_eq!(describe_type(value.as_ref()), "Hash");
    }

    #[test]
    fn test_descriptor_two_types_in_encounter_order() {
        let value = array(vec![
            Object::str("a"),
            Object::Integer(1),
            Object::str("b"),
            Object::Integer(2),
        ]);
        assert_eq!(describe_type(value.as_ref()), "Sequence<String,Integer>");
    }

    #[test]
    fn test_descriptor_three_types() {
        let value = array(vec![Object::Integer(1), Object::Float(1.0), Object::str("1")]);
        assert_eq!(describe_type(value.as_ref()), "Sequence<Integer,Float,String>");
    }

    #[test]
    fn test_descriptor_too_many_types() {
        let value = array(vec![
            Object::Integer(1),
            Object::Float(1.0),
            Object::str("1"),
            Object::Hash(Vec::new()),
            Object::Instance(Instance::new("Point")),
        ]);
        assert_eq!(describe_type(value.as_ref()), "Sequence");
    }

    #[test]
    fn test_descriptor_empty_sequence() {
        assert_eq!(describe_type(array(Vec::new()).as_ref()), "Sequence");
    }

    #[test]
    fn test_attribute_dispatch() {
        let value: ObjectRef = Arc::new(Object::str("hello"));
        let record = record_for(
            &value,
            AllocationSite::new("/work/src/lib.rs", 12)
                .in_type("MyClass")
                .in_method("my_method"),
        );

        assert_eq!(
            record.attribute(&Attribute::SourceFile, false),
            Value::from("/work/src/lib.rs")
        );
        assert_eq!(
            record.attribute(&Attribute::SourceFile, true),
            Value::from("<PWD>/src/lib.rs")
        );
        assert_eq!(record.attribute(&Attribute::SourceLine, false), Value::Int64(12));
        assert_eq!(record.attribute(&"class_path".into(), false), Value::from("MyClass"));
        assert_eq!(record.attribute(&"method_id".into(), false), Value::from("my_method"));
        assert_eq!(record.attribute(&"class".into(), false), Value::from("String"));
        assert_eq!(record.attribute(&"len".into(), false), Value::Int64(5));
        assert_eq!(record.attribute(&"nope".into(), false), Value::Null);
    }

    #[test]
    fn test_missing_metadata_is_null() {
        let value: ObjectRef = Arc::new(Object::Integer(3));
        let record = record_for(&value, AllocationSite::unknown());

        assert_eq!(record.attribute(&Attribute::SourceFile, true), Value::Null);
        assert_eq!(record.attribute(&Attribute::SourceLine, false), Value::Null);
        assert_eq!(record.attribute(&Attribute::TypePath, false), Value::Null);
        assert_eq!(record.attribute(&Attribute::PackageName, false), Value::Null);
        assert!(record.aliased_source_file().is_none());
    }

    #[test]
    fn test_package_name_attribute() {
        let value: ObjectRef = Arc::new(Object::str("x"));
        let record = record_for(
            &value,
            AllocationSite::new("/pkgs/packages/yajl-1.1.0/lib/yajl.rs", 3),
        );
        assert_eq!(record.package_name().as_deref(), Some("yajl-1.1.0"));
        assert_eq!(record.attribute(&"gem".into(), false), Value::from("yajl-1.1.0"));
    }

    #[test]
    fn test_record_does_not_keep_value_alive() {
        let value: ObjectRef = Arc::new(Object::Array(Object::integers(&[1, 2])));
        let mut record = record_for(&value, AllocationSite::new("/work/a.rs", 1));
        assert_eq!(record.type_descriptor(), "Sequence<Integer>");
        assert!(record.refresh_retained_bytes());

        drop(value);
        assert!(record.value().is_none());
        assert_eq!(record.type_name(), "Array");
        assert_eq!(record.type_descriptor(), "Array");
        assert!(!record.refresh_retained_bytes());
        assert_eq!(record.attribute(&"len".into(), false), Value::Null);
    }

    #[test]
    fn test_attribute_names_round_trip() {
        for name in ["source_file", "source_line", "type_path", "method_name",
                     "retained_bytes", "type_name", "type_descriptor", "package_name"] {
            assert_eq!(Attribute::from(name).as_str(), name);
        }
        assert_eq!(Attribute::from("color"), Attribute::Value("color".to_string()));
        assert!(Attribute::SourceLine.is_numeric());
        assert!(!Attribute::SourceFile.is_numeric());
    }
}
