//! Batched execution of independent queries.
//!
//! Two or more queries are unioned into a single statement, each branch tagged with its
//! position in a `_batch_idx` column:
//!
//! ```text
//! SELECT 0 AS _batch_idx, * FROM (<q0>) UNION ALL SELECT 1 AS _batch_idx, * FROM (<q1>) …
//! ```
//!
//! The engine may return rows in any order across branches, so results are partitioned by
//! the tag alone; rows keep their arrival order within a partition. The tag is stripped
//! before rows are handed back. The batch succeeds or fails as a unit.

use serde_json::Value;
use tracing::{debug, warn};

use crate::engine::{QueryEngine, Row};
use crate::error::FrameResult;

pub const BATCH_INDEX_COLUMN: &str = "_batch_idx";

/// The statement that `batch_query` sends, or `None` for an empty batch.
pub fn batch_sql(queries: &[String]) -> Option<String> {
    match queries {
        [] => None,
        [single] => Some(single.clone()),
        many => Some(
            many.iter()
                .enumerate()
                .map(|(i, q)| format!("SELECT {} AS {}, * FROM ({})", i, BATCH_INDEX_COLUMN, q))
                .collect::<Vec<_>>()
                .join(" UNION ALL "),
        ),
    }
}

fn batch_index(v: &Value) -> Option<usize> {
    match v {
        Value::Number(n) => n.as_u64().map(|u| u as usize).or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as usize)),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}

/// Split tagged rows back into `n` per-query vectors, in query order.
pub fn partition_rows(rows: Vec<Row>, n: usize) -> Vec<Vec<Row>> {
    let mut out: Vec<Vec<Row>> = vec![Vec::new(); n];
    let mut dropped = 0usize;
    for mut row in rows {
        match row.remove(BATCH_INDEX_COLUMN).as_ref().and_then(batch_index) {
            Some(idx) if idx < n => out[idx].push(row),
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!(target: "framequery::builder", "batch: dropped {} row(s) with missing or out-of-range {}", dropped, BATCH_INDEX_COLUMN);
    }
    out
}

pub async fn batch_query(engine: &dyn QueryEngine, queries: &[String]) -> FrameResult<Vec<Vec<Row>>> {
    let Some(sql) = batch_sql(queries) else {
        return Ok(Vec::new());
    };
    if queries.len() == 1 {
        debug!(target: "framequery::builder", "batch: single query passthrough");
        return Ok(vec![engine.query(&sql).await?.rows]);
    }
    debug!(target: "framequery::builder", "batch: {} queries in one round trip", queries.len());
    let result = engine.query(&sql).await?;
    Ok(partition_rows(result.rows, queries.len()))
}
