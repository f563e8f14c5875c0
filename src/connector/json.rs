//! JSON document import.
//!
//! Accepted roots:
//! - array of objects: one row per element, columns are the union of keys in first-seen order
//! - object: a single row
//! - array of scalars: a single column named `value`
//!
//! Each column gets the narrowest type that fits every non-null value (integer, float,
//! boolean, else string). Missing keys and JSON `null` become nulls.

use std::sync::Arc;

use async_trait::async_trait;
use polars::prelude::{self as pl, Column, NamedFrom, Series};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::{store_parsed_frame, Connector, ConnectorInfo, ConnectorKind, FileSourceConnector, FormData, ParsedFile, SourceFile};
use crate::error::{FrameError, FrameResult};
use crate::storage::DataFrameStorage;

pub struct JsonConnector {
    info: ConnectorInfo,
    storage: Arc<dyn DataFrameStorage>,
}

impl JsonConnector {
    pub fn new(storage: Arc<dyn DataFrameStorage>) -> Self {
        let info = ConnectorInfo {
            id: "json".into(),
            name: "JSON file".into(),
            description: "Array of records or a single record".into(),
            kind: ConnectorKind::File,
            form: Vec::new(),
            extensions: vec!["json".into()],
        };
        Self { info, storage }
    }
}

impl Connector for JsonConnector {
    fn info(&self) -> &ConnectorInfo { &self.info }

    fn as_file_source(&self) -> Option<&dyn FileSourceConnector> { Some(self) }
}

#[async_trait]
impl FileSourceConnector for JsonConnector {
    async fn parse(&self, file: &SourceFile, table_id: Uuid, _form: Option<&FormData>) -> FrameResult<ParsedFile> {
        let doc: Value = serde_json::from_slice(&file.bytes)
            .map_err(|e| FrameError::parse("json_parse", format!("{}: {}", file.name, e)))?;
        let df = json_to_frame(&doc)?;
        store_parsed_frame(self.storage.as_ref(), df, table_id).await
    }
}

pub(crate) fn json_to_frame(doc: &Value) -> FrameResult<pl::DataFrame> {
    let empty = Map::new();
    match doc {
        Value::Array(items) if items.is_empty() => Err(FrameError::parse("empty_source", "JSON array has no records")),
        Value::Array(items) if items.iter().all(Value::is_object) => {
            let rows: Vec<&Map<String, Value>> = items.iter().map(|v| v.as_object().unwrap_or(&empty)).collect();
            records_to_frame(&rows)
        }
        Value::Array(items) => {
            let values: Vec<&Value> = items.iter().collect();
            Ok(pl::DataFrame::new(vec![infer_column("value", &values)])?)
        }
        Value::Object(map) => records_to_frame(&[map]),
        _ => Err(FrameError::parse("json_root", "expected an array or an object at the document root")),
    }
}

fn records_to_frame(rows: &[&Map<String, Value>]) -> FrameResult<pl::DataFrame> {
    let mut keys: Vec<&str> = Vec::new();
    for row in rows {
        for k in row.keys() {
            if !keys.contains(&k.as_str()) {
                keys.push(k);
            }
        }
    }
    debug!(target: "framequery::connector", keys=?keys, rows = rows.len(), "json records");
    let columns = keys
        .iter()
        .map(|k| {
            let values: Vec<&Value> = rows.iter().map(|r| r.get(*k).unwrap_or(&Value::Null)).collect();
            infer_column(k, &values)
        })
        .collect();
    Ok(pl::DataFrame::new(columns)?)
}

fn infer_column(name: &str, values: &[&Value]) -> Column {
    let present = || values.iter().filter(|v| !v.is_null());
    let series = if present().count() > 0 && present().all(|v| v.as_i64().is_some()) {
        Series::new(name.into(), values.iter().map(|v| v.as_i64()).collect::<Vec<Option<i64>>>())
    } else if present().count() > 0 && present().all(|v| v.is_number()) {
        Series::new(name.into(), values.iter().map(|v| v.as_f64()).collect::<Vec<Option<f64>>>())
    } else if present().count() > 0 && present().all(|v| v.is_boolean()) {
        Series::new(name.into(), values.iter().map(|v| v.as_bool()).collect::<Vec<Option<bool>>>())
    } else {
        Series::new(name.into(), values.iter().map(|v| value_to_string(v)).collect::<Vec<Option<String>>>())
    };
    Column::from(series)
}

fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
