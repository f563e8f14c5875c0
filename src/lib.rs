pub mod error;
pub mod config;
pub mod logging;
pub mod model;
pub mod dataframe;
pub mod storage;
pub mod engine;
pub mod query;
pub mod planner;
pub mod connector;
pub mod encoding;
pub mod fields;
pub mod loader;

#[cfg(test)]
mod test_support;

pub use config::FrameQueryConfig;
pub use dataframe::{DataFrame, DataFrameSerialization, PrimaryKey, StorageLocation};
pub use engine::{PolarsEngine, QueryEngine, QueryResult, Row};
pub use error::{FrameError, FrameResult};
pub use loader::FrameLoader;
pub use planner::{ExecutionPlan, Query, QueryPlanner};
pub use query::QueryBuilder;
pub use storage::DataFrameStorage;
