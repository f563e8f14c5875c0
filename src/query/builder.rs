//! Immutable, chainable SQL compiler over one registered frame.
//!
//! Every chain method borrows the receiver and returns a new builder, so a builder can be
//! forked freely; the receiver's SQL never changes. Terminal operations execute against the
//! engine and return rows, a count, or a newly materialised `DataFrame`.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::batch;
use super::sql::{order_by_clause, qualified_ident, quote_ident, quote_literal, where_clause, FilterOp, FilterPredicate, FilterValue, SortSpec};
use crate::dataframe::{DataFrame, PrimaryKey};
use crate::engine::{QueryEngine, Row};
use crate::error::{FrameError, FrameResult};
use crate::model::JoinType;
use crate::storage::DataFrameStorage;

pub const DEFAULT_EXPORT_FILE: &str = "output.arrow";

/// A join against another registered table, keyed on one column per side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub table: String,
    pub left_key: String,
    pub right_key: String,
    pub join_type: JoinType,
}

impl JoinClause {
    pub fn new(table: impl Into<String>, left_key: impl Into<String>, right_key: impl Into<String>, join_type: JoinType) -> Self {
        Self { table: table.into(), left_key: left_key.into(), right_key: right_key.into(), join_type }
    }

    fn to_sql(&self, base: &str) -> String {
        format!(
            "{} {} ON {} = {}",
            self.join_type.sql_keyword(),
            quote_ident(&self.table),
            qualified_ident(base, &self.left_key),
            qualified_ident(&self.table, &self.right_key)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct QueryState {
    select: Option<Vec<String>>,
    filters: Vec<FilterPredicate>,
    sort: Vec<SortSpec>,
    limit: Option<usize>,
    offset: Option<usize>,
    joins: Vec<JoinClause>,
}

#[derive(Clone)]
pub struct QueryBuilder {
    engine: Arc<dyn QueryEngine>,
    frame: DataFrame,
    table: String,
    field_ids: Vec<Uuid>,
    export_file: String,
    state: QueryState,
}

impl std::fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("frame", &self.frame.id())
            .field("table", &self.table)
            .field("sql", &self.sql())
            .finish()
    }
}

impl QueryBuilder {
    /// Builder over `frame`, which the caller has registered in `engine` as `table`.
    pub fn new(engine: Arc<dyn QueryEngine>, frame: DataFrame, table: impl Into<String>) -> Self {
        let field_ids = frame.field_ids().to_vec();
        Self {
            engine,
            frame,
            table: table.into(),
            field_ids,
            export_file: DEFAULT_EXPORT_FILE.to_string(),
            state: QueryState::default(),
        }
    }

    fn derive(&self, f: impl FnOnce(&mut QueryState)) -> Self {
        let mut next = self.clone();
        f(&mut next.state);
        next
    }

    pub fn frame(&self) -> &DataFrame { &self.frame }
    pub fn table_name(&self) -> &str { &self.table }
    pub fn field_ids(&self) -> &[Uuid] { &self.field_ids }

    /// Replace the projection. An empty list selects `*`.
    pub fn select<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cols: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.derive(|s| s.select = if cols.is_empty() { None } else { Some(cols) })
    }

    pub fn filter(&self, predicate: FilterPredicate) -> Self {
        self.derive(|s| s.filters.push(predicate))
    }

    pub fn filter_where(&self, column: impl Into<String>, op: FilterOp, value: impl Into<FilterValue>) -> Self {
        self.filter(FilterPredicate::new(column, op, value))
    }

    pub fn sort(&self, spec: SortSpec) -> Self {
        self.derive(|s| s.sort.push(spec))
    }

    pub fn limit(&self, n: usize) -> Self {
        self.derive(|s| s.limit = Some(n))
    }

    pub fn offset(&self, n: usize) -> Self {
        self.derive(|s| s.offset = Some(n))
    }

    pub fn join(&self, clause: JoinClause) -> Self {
        self.derive(|s| s.joins.push(clause))
    }

    /// Field ids carried into frames produced by `run()`.
    pub fn with_field_ids(&self, field_ids: Vec<Uuid>) -> Self {
        let mut next = self.clone();
        next.field_ids = field_ids;
        next
    }

    pub fn with_export_file(&self, file: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.export_file = file.into();
        next
    }

    fn from_clause(&self) -> String {
        let mut out = format!("FROM {}", quote_ident(&self.table));
        for j in &self.state.joins {
            out.push(' ');
            out.push_str(&j.to_sql(&self.table));
        }
        out
    }

    fn projection(&self) -> String {
        match &self.state.select {
            Some(cols) => cols.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            None => "*".to_string(),
        }
    }

    /// `SELECT … FROM "t" [JOIN …] [WHERE …] [ORDER BY …] [LIMIT n] [OFFSET m]`
    pub fn sql(&self) -> String {
        let mut parts = vec![format!("SELECT {}", self.projection()), self.from_clause()];
        if let Some(w) = where_clause(&self.state.filters) { parts.push(w); }
        if let Some(o) = order_by_clause(&self.state.sort) { parts.push(o); }
        if let Some(l) = self.state.limit { parts.push(format!("LIMIT {}", l)); }
        if let Some(o) = self.state.offset { parts.push(format!("OFFSET {}", o)); }
        parts.join(" ")
    }

    /// Count over the filtered, joined rows; projection, ordering and paging are dropped.
    pub fn count_sql(&self) -> String {
        let mut inner = vec!["SELECT *".to_string(), self.from_clause()];
        if let Some(w) = where_clause(&self.state.filters) { inner.push(w); }
        format!("SELECT COUNT(*) as count FROM ({})", inner.join(" "))
    }

    pub async fn rows(&self) -> FrameResult<Vec<Row>> {
        let sql = self.sql();
        debug!(target: "framequery::builder", "rows: table='{}' sql={}", self.table, sql);
        Ok(self.engine.query(&sql).await?.rows)
    }

    pub async fn count(&self) -> FrameResult<u64> {
        let sql = self.count_sql();
        debug!(target: "framequery::builder", "count: table='{}' sql={}", self.table, sql);
        let result = self.engine.query(&sql).await?;
        match result.rows.first() {
            None => Ok(0),
            Some(row) => {
                let v = row.get("count").or_else(|| result.scalar()).unwrap_or(&Value::Null);
                coerce_count(v)
            }
        }
    }

    /// First `n` rows; overrides any earlier limit.
    pub async fn preview(&self, n: usize) -> FrameResult<Vec<Row>> {
        self.limit(n).rows().await
    }

    /// Export the query through the engine and persist the result as a new frame.
    /// The source frame is untouched.
    pub async fn run(&self, storage: &dyn DataFrameStorage) -> FrameResult<DataFrame> {
        let copy = format!("COPY ({}) TO {} (FORMAT ARROW)", self.sql(), quote_literal(&self.export_file));
        debug!(target: "framequery::builder", "run: table='{}' sql={}", self.table, copy);
        self.engine.query(&copy).await?;
        let bytes = self.engine.read_file(&self.export_file).await?;
        self.engine.remove_file(&self.export_file).await?;
        let frame = DataFrame::create(storage, &bytes, self.field_ids.clone(), self.carried_primary_key()).await?;
        debug!(target: "framequery::builder", "run: source={} produced={} bytes={}", self.frame.id(), frame.id(), bytes.len());
        Ok(frame)
    }

    /// The source key survives only if the projection keeps every key column.
    fn carried_primary_key(&self) -> Option<PrimaryKey> {
        let key = self.frame.primary_key()?;
        match &self.state.select {
            None => Some(key.clone()),
            Some(cols) => key.columns().iter().all(|k| cols.iter().any(|c| c == k)).then(|| key.clone()),
        }
    }

    /// Execute several independent queries in one engine round trip. See `batch`.
    pub async fn batch_query(engine: &dyn QueryEngine, queries: &[String]) -> FrameResult<Vec<Vec<Row>>> {
        batch::batch_query(engine, queries).await
    }
}

fn coerce_count(v: &Value) -> FrameResult<u64> {
    let n = match v {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.max(0.0) as u64),
        _ => None,
    };
    n.ok_or_else(|| FrameError::engine("count_not_numeric", format!("COUNT(*) returned non-numeric value {}", v)))
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod builder_tests;
