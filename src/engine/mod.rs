//! Query engine contract.
//!
//! An engine executes SQL text against named tables and can ingest an Arrow IPC buffer
//! as a table. `initialize()` must complete before any query; it is idempotent. Querying
//! a name that was never registered is reported by the engine as an ordinary SQL error.
//!
//! The dialect is DuckDB-compatible: double-quoted identifiers, `date_trunc`, `monthname`,
//! `dayname`, `quarter`, and `COPY (<query>) TO '<file>' (FORMAT ARROW)` for exports, whose
//! output is fetched with `read_file`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataframe::DataFrame;
use crate::error::FrameResult;

pub mod convert;
mod date_functions;
pub mod polars_engine;

pub use polars_engine::PolarsEngine;

/// One result row keyed by column name.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        Self { columns, rows, row_count }
    }

    /// First column of the first row, if any.
    pub fn scalar(&self) -> Option<&Value> {
        let first = self.columns.first()?;
        self.rows.first()?.get(first)
    }
}

#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn initialize(&self) -> FrameResult<()>;

    fn is_ready(&self) -> bool;

    /// Register the frame's stored bytes under `name`, replacing any existing table.
    async fn register_table(&self, name: &str, frame: &DataFrame) -> FrameResult<()>;

    /// Register an Arrow IPC buffer under `name`, replacing any existing table.
    async fn register_arrow_table(&self, name: &str, buffer: &[u8]) -> FrameResult<()>;

    async fn unregister_table(&self, name: &str) -> FrameResult<()>;

    async fn has_table(&self, name: &str) -> FrameResult<bool>;

    async fn table_names(&self) -> FrameResult<Vec<String>>;

    async fn query(&self, sql: &str) -> FrameResult<QueryResult>;

    /// Bytes of a file written by a previous `COPY … TO` statement.
    async fn read_file(&self, path: &str) -> FrameResult<Vec<u8>>;

    async fn remove_file(&self, path: &str) -> FrameResult<()>;

    async fn dispose(&self) -> FrameResult<()>;
}
