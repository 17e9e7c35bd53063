pub mod paths;
pub mod record;
pub mod value;

pub use paths::PathAliases;
pub use record::{describe_type, AllocationRecord, Attribute};
pub use value::{GroupKey, Value};
