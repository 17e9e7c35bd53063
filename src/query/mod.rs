pub mod executor;
pub mod plan;
pub mod result;

pub use executor::{AllocationsProxy, DEFAULT_COLUMNS};
pub use plan::{FilterPlan, GroupByPlan, MapperPlan, QueryPlan};
pub use result::{Groups, Resolved};

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("group_by requires at least one attribute")]
    EmptyGrouping,

    #[error("{mapper} requires a grouped result; call group_by first")]
    RequiresGrouping { mapper: &'static str },

    #[error("{mapper} cannot be applied to a {shape} result")]
    InvalidShape {
        mapper: &'static str,
        shape: &'static str,
    },

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
