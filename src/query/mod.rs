//! SQL synthesis over registered frames.

pub mod sql;
pub mod builder;
pub mod batch;

pub use builder::{JoinClause, QueryBuilder, DEFAULT_EXPORT_FILE};
pub use batch::{batch_query, batch_sql, BATCH_INDEX_COLUMN};
pub use sql::{quote_ident, quote_literal, FilterOp, FilterPredicate, FilterValue, SortDirection, SortSpec};
