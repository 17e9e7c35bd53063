//! Built-in value kinds for the in-process [`Heap`](super::Heap)

use super::{AccessorTable, ObjectRef, TracedValue};
use crate::data::Value;
use std::mem::size_of;
use std::sync::LazyLock;

#[derive(Debug, Clone)]
pub enum Object {
    Integer(i64),
    Float(f64),
    Str(String),
    Array(Vec<ObjectRef>),
    Hash(Vec<(ObjectRef, ObjectRef)>),
    Instance(Instance),
}

/// An object of a user-defined class with scalar fields
#[derive(Debug, Clone)]
pub struct Instance {
    pub class: String,
    pub fields: Vec<(String, Value)>,
}

impl Instance {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

static OBJECT_ACCESSORS: LazyLock<AccessorTable<Object>> = LazyLock::new(|| {
    AccessorTable::<Object>::new()
        .with("len", |obj| match obj {
            Object::Str(s) => Some(Value::from(s.chars().count())),
            Object::Array(items) => Some(Value::from(items.len())),
            Object::Hash(pairs) => Some(Value::from(pairs.len())),
            Object::Instance(inst) => Some(Value::from(inst.fields.len())),
            Object::Integer(_) | Object::Float(_) => None,
        })
        .with("value", |obj| match obj {
            Object::Integer(i) => Some(Value::Int64(*i)),
            Object::Float(f) => Some(Value::Float64(*f)),
            Object::Str(s) => Some(Value::String(s.clone())),
            _ => None,
        })
        .with("is_empty", |obj| match obj {
            Object::Str(s) => Some(Value::Bool(s.is_empty())),
            Object::Array(items) => Some(Value::Bool(items.is_empty())),
            Object::Hash(pairs) => Some(Value::Bool(pairs.is_empty())),
            _ => None,
        })
});

impl Object {
    pub fn str(s: impl Into<String>) -> Self {
        Object::Str(s.into())
    }

    pub fn integers(values: &[i64]) -> Vec<ObjectRef> {
        values
            .iter()
            .map(|v| std::sync::Arc::new(Object::Integer(*v)) as ObjectRef)
            .collect()
    }
}

impl TracedValue for Object {
    fn type_name(&self) -> &str {
        match self {
            Object::Integer(_) => "Integer",
            Object::Float(_) => "Float",
            Object::Str(_) => "String",
            Object::Array(_) => "Array",
            Object::Hash(_) => "Hash",
            Object::Instance(inst) => &inst.class,
        }
    }

    fn shallow_size(&self) -> u64 {
        let payload = match self {
            Object::Integer(_) | Object::Float(_) => 0,
            Object::Str(s) => s.capacity(),
            Object::Array(items) => items.capacity() * size_of::<ObjectRef>(),
            Object::Hash(pairs) => pairs.capacity() * size_of::<(ObjectRef, ObjectRef)>(),
            Object::Instance(inst) => {
                inst.class.capacity()
                    + inst.fields.capacity() * size_of::<(String, Value)>()
                    + inst.fields.iter().map(|(n, _)| n.capacity()).sum::<usize>()
            }
        };
        (size_of::<Object>() + payload) as u64
    }

    fn element_type_names(&self) -> Option<Vec<String>> {
        match self {
            Object::Array(items) => Some(
                items
                    .iter()
                    .map(|item| item.type_name().to_string())
                    .collect(),
            ),
            _ => None,
        }
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        if let Object::Instance(inst) = self {
            if let Some(value) = inst.field(name) {
                return Some(value.clone());
            }
        }
        OBJECT_ACCESSORS.get(self, name)
    }
}
