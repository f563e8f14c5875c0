//! Conversions between polars frames, Arrow IPC buffers and JSON rows.

use std::io::Cursor;

use polars::prelude::{self as pl, AnyValue, DataType, IpcReader, IpcWriter, SerReader, SerWriter};
use serde_json::Value;

use super::{QueryResult, Row};
use crate::error::FrameResult;
use crate::model::ColumnType;

/// Encode a polars frame as an Arrow IPC file buffer.
pub fn frame_to_ipc(df: &mut pl::DataFrame) -> FrameResult<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();
    IpcWriter::new(&mut buf).finish(df)?;
    Ok(buf)
}

/// Decode an Arrow IPC file buffer.
pub fn ipc_to_frame(bytes: &[u8]) -> FrameResult<pl::DataFrame> {
    Ok(IpcReader::new(Cursor::new(bytes.to_vec())).finish()?)
}

pub fn column_type_of(dtype: &DataType) -> ColumnType {
    match dtype {
        DataType::Boolean => ColumnType::Boolean,
        DataType::String => ColumnType::String,
        DataType::Date | DataType::Datetime(_, _) => ColumnType::Date,
        dt if dt.is_integer() || dt.is_float() => ColumnType::Number,
        _ => ColumnType::Unknown,
    }
}

fn any_to_json(av: AnyValue<'_>) -> Value {
    match av {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(v) => Value::Bool(v),
        AnyValue::Int32(v) => serde_json::json!(v as i64),
        AnyValue::Int64(v) => serde_json::json!(v),
        AnyValue::UInt32(v) => serde_json::json!(v as u64),
        AnyValue::UInt64(v) => serde_json::json!(v),
        AnyValue::Float32(v) => serde_json::Number::from_f64(v as f64).map(Value::Number).unwrap_or(Value::Null),
        AnyValue::Float64(v) => serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
        AnyValue::String(v) => Value::String(v.to_string()),
        AnyValue::StringOwned(v) => Value::String(v.to_string()),
        other => Value::String(other.to_string()),
    }
}

/// Materialise a polars frame as JSON rows, preserving column order in `columns`.
pub fn frame_to_result(df: &pl::DataFrame) -> QueryResult {
    let columns: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();
    let mut rows: Vec<Row> = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let mut map = Row::new();
        for c in &columns {
            let v = match df.column(c) {
                Ok(col) => col.get(row_idx).map(any_to_json).unwrap_or(Value::Null),
                Err(_) => Value::Null,
            };
            map.insert(c.clone(), v);
        }
        rows.push(map);
    }
    QueryResult::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{Column, NamedFrom, Series};

    fn sample() -> pl::DataFrame {
        pl::DataFrame::new(vec![
            Column::from(Series::new("name".into(), vec![Some("a"), None])),
            Column::from(Series::new("score".into(), vec![1.5f64, f64::NAN])),
            Column::from(Series::new("n".into(), vec![7i64, 8])),
            Column::from(Series::new("ok".into(), vec![true, false])),
        ])
        .unwrap()
    }

    #[test]
    fn ipc_roundtrip_preserves_shape() {
        let mut df = sample();
        let bytes = frame_to_ipc(&mut df).unwrap();
        let back = ipc_to_frame(&bytes).unwrap();
        assert_eq!(back.shape(), (2, 4));
        assert!(back.equals_missing(&df));
    }

    #[test]
    fn rows_follow_column_order_and_types() {
        let res = frame_to_result(&sample());
        assert_eq!(res.columns, vec!["name", "score", "n", "ok"]);
        assert_eq!(res.row_count, 2);
        assert_eq!(res.rows[0]["name"], serde_json::json!("a"));
        assert_eq!(res.rows[0]["n"], serde_json::json!(7));
        assert_eq!(res.rows[0]["ok"], serde_json::json!(true));
        assert_eq!(res.rows[1]["name"], Value::Null);
        // non-finite floats have no JSON form
        assert_eq!(res.rows[1]["score"], Value::Null);
    }

    #[test]
    fn dtype_mapping() {
        assert_eq!(column_type_of(&DataType::Int64), ColumnType::Number);
        assert_eq!(column_type_of(&DataType::Float32), ColumnType::Number);
        assert_eq!(column_type_of(&DataType::String), ColumnType::String);
        assert_eq!(column_type_of(&DataType::Boolean), ColumnType::Boolean);
        assert_eq!(column_type_of(&DataType::Date), ColumnType::Date);
        assert_eq!(column_type_of(&DataType::Null), ColumnType::Unknown);
    }
}
