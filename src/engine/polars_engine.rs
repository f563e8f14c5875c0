//! Embedded engine built on polars' SQL context.
//!
//! Tables are held as decoded polars frames; each statement builds a fresh `SQLContext`
//! over the registered tables. The DuckDB export form
//! `COPY (<query>) TO '<file>' (FORMAT ARROW)` is translated here: the inner query runs and
//! its result is kept as an Arrow IPC buffer in an in-engine file map until read back with
//! `read_file`. DuckDB date functions are translated by `date_functions`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use polars::prelude as pl;
use polars::sql::SQLContext;
use regex::Regex;
use tracing::{debug, info};

use super::convert::{frame_to_ipc, frame_to_result, ipc_to_frame};
use super::date_functions::{rewrite_date_functions, with_derived_columns};
use super::{QueryEngine, QueryResult, Row};
use crate::dataframe::DataFrame;
use crate::error::{FrameError, FrameResult};
use crate::storage::DataFrameStorage;

static COPY_TO_ARROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*COPY\s*\((?P<query>.*)\)\s*TO\s*'(?P<path>[^']+)'\s*\(\s*FORMAT\s+ARROW\s*\)\s*;?\s*$")
        .expect("valid COPY regex")
});

#[derive(Default)]
struct EngineState {
    ready: bool,
    tables: HashMap<String, pl::DataFrame>,
    files: HashMap<String, Vec<u8>>,
}

pub struct PolarsEngine {
    storage: Arc<dyn DataFrameStorage>,
    state: Mutex<EngineState>,
}

fn not_ready() -> FrameError {
    FrameError::engine("engine_not_initialized", "query engine used before initialize()")
}

/// Words that may follow a derived table without being its alias.
const CLAUSE_KEYWORDS: &[&str] = &[
    "union", "except", "intersect", "where", "group", "having", "order", "limit", "offset",
    "join", "inner", "left", "right", "full", "cross", "on", "using", "window", "qualify",
];

fn followed_by_alias(rest: &str) -> bool {
    let rest = rest.trim_start();
    if rest.starts_with('"') {
        return true;
    }
    let word: String = rest.chars().take_while(|c| c.is_alphanumeric() || *c == '_').collect();
    !word.is_empty() && !CLAUSE_KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k))
}

/// Give every unaliased `FROM (...)` / `JOIN (...)` subquery a generated alias; polars
/// rejects anonymous derived tables.
pub(crate) fn alias_derived_tables(sql: &str) -> String {
    let chars: Vec<(usize, char)> = sql.char_indices().collect();
    let mut out = String::with_capacity(sql.len() + 16);
    let mut opens: Vec<bool> = Vec::new();
    let mut last_word = String::new();
    let mut generated = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let (pos, c) = chars[i];
        match c {
            '\'' | '"' => {
                out.push(c);
                i += 1;
                while i < chars.len() {
                    let (_, q) = chars[i];
                    out.push(q);
                    i += 1;
                    if q == c {
                        if i < chars.len() && chars[i].1 == c {
                            out.push(c);
                            i += 1;
                        } else {
                            break;
                        }
                    }
                }
                last_word.clear();
                continue;
            }
            '(' => {
                opens.push(last_word.eq_ignore_ascii_case("from") || last_word.eq_ignore_ascii_case("join"));
                last_word.clear();
                out.push(c);
            }
            ')' => {
                out.push(c);
                if opens.pop() == Some(true) && !followed_by_alias(&sql[pos + 1..]) {
                    generated += 1;
                    out.push_str(&format!(" AS _sq{}", generated));
                }
                last_word.clear();
            }
            c if c.is_alphanumeric() || c == '_' => {
                last_word.clear();
                while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                    last_word.push(chars[i].1);
                    out.push(chars[i].1);
                    i += 1;
                }
                continue;
            }
            c => {
                if !c.is_whitespace() {
                    last_word.clear();
                }
                out.push(c);
            }
        }
        i += 1;
    }
    out
}

fn run_sql(tables: &HashMap<String, pl::DataFrame>, sql: &str) -> FrameResult<pl::DataFrame> {
    let (sql, derived) = rewrite_date_functions(&alias_derived_tables(sql));
    let mut ctx = SQLContext::new();
    for (name, df) in tables {
        ctx.register(name, with_derived_columns(df, &derived));
    }
    let lf = ctx.execute(&sql).map_err(|e| FrameError::engine("sql_error", e.to_string()))?;
    lf.collect().map_err(|e| FrameError::engine("sql_error", e.to_string()))
}

impl PolarsEngine {
    /// `storage` supplies frame bytes for `register_table`.
    pub fn new(storage: Arc<dyn DataFrameStorage>) -> Self {
        Self { storage, state: Mutex::new(EngineState::default()) }
    }

    fn snapshot_tables(&self) -> FrameResult<HashMap<String, pl::DataFrame>> {
        let st = self.state.lock();
        if !st.ready { return Err(not_ready()); }
        Ok(st.tables.clone())
    }
}

#[async_trait]
impl QueryEngine for PolarsEngine {
    async fn initialize(&self) -> FrameResult<()> {
        let mut st = self.state.lock();
        if !st.ready {
            st.ready = true;
            info!(target: "framequery::engine", "polars engine initialized (storage backend={})", self.storage.backend_name());
        }
        Ok(())
    }

    fn is_ready(&self) -> bool { self.state.lock().ready }

    async fn register_table(&self, name: &str, frame: &DataFrame) -> FrameResult<()> {
        if !self.is_ready() { return Err(not_ready()); }
        let bytes = frame.load_bytes(self.storage.as_ref()).await?;
        self.register_arrow_table(name, &bytes).await
    }

    async fn register_arrow_table(&self, name: &str, buffer: &[u8]) -> FrameResult<()> {
        let df = ipc_to_frame(buffer)?;
        let mut st = self.state.lock();
        if !st.ready { return Err(not_ready()); }
        debug!(target: "framequery::engine", "register_arrow_table: name='{}' rows={} cols={}", name, df.height(), df.width());
        st.tables.insert(name.to_string(), df);
        Ok(())
    }

    async fn unregister_table(&self, name: &str) -> FrameResult<()> {
        let mut st = self.state.lock();
        if !st.ready { return Err(not_ready()); }
        let removed = st.tables.remove(name).is_some();
        debug!(target: "framequery::engine", "unregister_table: name='{}' removed={}", name, removed);
        Ok(())
    }

    async fn has_table(&self, name: &str) -> FrameResult<bool> {
        let st = self.state.lock();
        if !st.ready { return Err(not_ready()); }
        Ok(st.tables.contains_key(name))
    }

    async fn table_names(&self) -> FrameResult<Vec<String>> {
        let st = self.state.lock();
        if !st.ready { return Err(not_ready()); }
        let mut names: Vec<String> = st.tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn query(&self, sql: &str) -> FrameResult<QueryResult> {
        let tables = self.snapshot_tables()?;
        if let Some(caps) = COPY_TO_ARROW.captures(sql) {
            let inner = caps.name("query").map(|m| m.as_str()).unwrap_or_default();
            let path = caps.name("path").map(|m| m.as_str().to_string()).unwrap_or_default();
            let mut df = run_sql(&tables, inner)?;
            let bytes = frame_to_ipc(&mut df)?;
            debug!(target: "framequery::engine", "copy: path='{}' rows={} bytes={}", path, df.height(), bytes.len());
            self.state.lock().files.insert(path, bytes);
            let mut row = Row::new();
            row.insert("Count".into(), serde_json::json!(df.height()));
            return Ok(QueryResult::new(vec!["Count".into()], vec![row]));
        }
        debug!(target: "framequery::engine", "query: {}", sql);
        let df = run_sql(&tables, sql)?;
        Ok(frame_to_result(&df))
    }

    async fn read_file(&self, path: &str) -> FrameResult<Vec<u8>> {
        let st = self.state.lock();
        if !st.ready { return Err(not_ready()); }
        st.files.get(path).cloned().ok_or_else(|| FrameError::engine("file_not_found", format!("no engine file '{}'", path)))
    }

    async fn remove_file(&self, path: &str) -> FrameResult<()> {
        let mut st = self.state.lock();
        if !st.ready { return Err(not_ready()); }
        st.files.remove(path);
        Ok(())
    }

    async fn dispose(&self) -> FrameResult<()> {
        let mut st = self.state.lock();
        if st.ready {
            info!(target: "framequery::engine", "polars engine disposed: tables={} files={}", st.tables.len(), st.files.len());
        }
        *st = EngineState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_wrapper_gets_alias() {
        assert_eq!(
            alias_derived_tables("SELECT COUNT(*) as count FROM (SELECT * FROM \"t\" WHERE \"a\" > 1)"),
            "SELECT COUNT(*) as count FROM (SELECT * FROM \"t\" WHERE \"a\" > 1) AS _sq1"
        );
    }

    #[test]
    fn union_branches_get_distinct_aliases() {
        let sql = "SELECT 0 AS _batch_idx, * FROM (SELECT 1 AS v) UNION ALL SELECT 1 AS _batch_idx, * FROM (SELECT 2 AS v)";
        assert_eq!(
            alias_derived_tables(sql),
            "SELECT 0 AS _batch_idx, * FROM (SELECT 1 AS v) AS _sq1 UNION ALL SELECT 1 AS _batch_idx, * FROM (SELECT 2 AS v) AS _sq2"
        );
    }

    #[test]
    fn existing_aliases_and_literals_are_left_alone() {
        let sql = "SELECT * FROM (SELECT ')from(' AS \"x(\") sub WHERE x IN (1, 2)";
        assert_eq!(alias_derived_tables(sql), sql);
        let sql = "SELECT * FROM (SELECT 1) AS s";
        assert_eq!(alias_derived_tables(sql), sql);
        assert_eq!(alias_derived_tables("SELECT count(*) FROM \"t\""), "SELECT count(*) FROM \"t\"");
    }

    #[tokio::test]
    async fn unusable_before_initialize() {
        let engine = PolarsEngine::new(Arc::new(crate::storage::MemoryStorage::new()));
        assert!(!engine.is_ready());
        let err = engine.query("SELECT 1").await.unwrap_err();
        assert_eq!(err.code_str(), "engine_not_initialized");
        engine.initialize().await.unwrap();
        engine.initialize().await.unwrap();
        assert!(engine.is_ready());
        engine.dispose().await.unwrap();
        assert!(!engine.is_ready());
    }
}
