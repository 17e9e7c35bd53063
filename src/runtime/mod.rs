//! Host runtime capabilities consumed by the tracer
//!
//! The collector never inspects memory itself. It relies on an [`ObjectSpace`]
//! that can switch allocation tracing on and off, enumerate live objects and
//! report where each traced object was allocated.

pub mod heap;
pub mod objects;

pub use heap::Heap;
pub use objects::{Instance, Object};

use crate::data::Value;
use crate::trace::TraceError;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a value living in an object space
pub type ObjectRef = Arc<dyn TracedValue>;

/// A value whose allocation can be attributed to a source location
pub trait TracedValue: Send + Sync + fmt::Debug {
    /// Concrete runtime type name, e.g. `"Hash"`
    fn type_name(&self) -> &str;

    /// Shallow memory footprint in bytes
    fn shallow_size(&self) -> u64;

    /// Element type names, in element order, for sequence-like values
    fn element_type_names(&self) -> Option<Vec<String>> {
        None
    }

    /// Look up a named property of the value
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Stable identity of an object within its object space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// A live object as seen during a scan
#[derive(Debug, Clone)]
pub struct LiveObject {
    pub id: ObjectId,
    pub value: ObjectRef,
}

/// Where an object was allocated. Every field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationSite {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub type_path: Option<String>,
    pub method_name: Option<String>,
}

impl AllocationSite {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: Some(file.into()),
            line: Some(line),
            type_path: None,
            method_name: None,
        }
    }

    /// Site with no known source location
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn in_type(mut self, type_path: impl Into<String>) -> Self {
        self.type_path = Some(type_path.into());
        self
    }

    pub fn in_method(mut self, method_name: impl Into<String>) -> Self {
        self.method_name = Some(method_name.into());
        self
    }
}

/// Capture the allocation site of the invocation: absolute source file and line
#[macro_export]
macro_rules! site {
    () => {
        $crate::runtime::AllocationSite::new(
            concat!(env!("CARGO_MANIFEST_DIR"), "/", file!()),
            line!(),
        )
    };
}

/// Allocation tracing capability of a host runtime
pub trait ObjectSpace {
    /// Start attributing new allocations to their sites
    fn begin_tracing(&self) -> Result<(), TraceError>;

    fn stop_tracing(&self);

    /// Forget all site metadata recorded so far
    fn clear_tracing_state(&self);

    fn live_objects(&self) -> Vec<LiveObject>;

    /// Site metadata for an object allocated while tracing, `None` otherwise
    fn allocation_site(&self, id: ObjectId) -> Option<AllocationSite>;

    fn shallow_size(&self, object: &LiveObject) -> u64 {
        object.value.shallow_size()
    }
}

/// Named getters a value type registers for attribute lookups
pub struct AccessorTable<T: ?Sized> {
    getters: Vec<(&'static str, fn(&T) -> Option<Value>)>,
}

impl<T: ?Sized> AccessorTable<T> {
    pub fn new() -> Self {
        Self {
            getters: Vec::new(),
        }
    }

    pub fn with(mut self, name: &'static str, getter: fn(&T) -> Option<Value>) -> Self {
        self.getters.push((name, getter));
        self
    }

    pub fn get(&self, target: &T, name: &str) -> Option<Value> {
        self.getters
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, getter)| getter(target))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.getters.iter().map(|(n, _)| *n)
    }
}

impl<T: ?Sized> Default for AccessorTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
