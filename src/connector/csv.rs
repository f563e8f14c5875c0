//! Delimited text import backed by the polars CSV reader.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use polars::prelude::{CsvParseOptions, CsvReadOptions, SerReader};
use uuid::Uuid;

use super::{form_value, store_parsed_frame, Connector, ConnectorInfo, ConnectorKind, FileSourceConnector, FormData, FormField, ParsedFile, SourceFile};
use crate::error::{FrameError, FrameResult};
use crate::storage::DataFrameStorage;

pub struct CsvConnector {
    info: ConnectorInfo,
    storage: Arc<dyn DataFrameStorage>,
}

impl CsvConnector {
    pub fn new(storage: Arc<dyn DataFrameStorage>) -> Self {
        let info = ConnectorInfo {
            id: "csv".into(),
            name: "CSV file".into(),
            description: "Comma or otherwise delimited text with an optional header row".into(),
            kind: ConnectorKind::File,
            form: vec![
                FormField::text("delimiter", "Delimiter").with_default(","),
                FormField::text("hasHeader", "First row is a header").with_default("true"),
            ],
            extensions: vec!["csv".into(), "tsv".into(), "txt".into()],
        };
        Self { info, storage }
    }
}

fn delimiter(file: &SourceFile, form: Option<&FormData>) -> FrameResult<u8> {
    match form_value(form, "delimiter") {
        Some("\\t") | Some("tab") => Ok(b'\t'),
        Some(d) if d.len() == 1 => Ok(d.as_bytes()[0]),
        Some(d) => Err(FrameError::parse("csv_delimiter", format!("delimiter must be a single byte, got '{}'", d))),
        None if file.extension().as_deref() == Some("tsv") => Ok(b'\t'),
        None => Ok(b','),
    }
}

fn has_header(form: Option<&FormData>) -> bool {
    !matches!(form_value(form, "hasHeader"), Some(v) if v.eq_ignore_ascii_case("false") || v == "0")
}

impl Connector for CsvConnector {
    fn info(&self) -> &ConnectorInfo { &self.info }

    fn as_file_source(&self) -> Option<&dyn FileSourceConnector> { Some(self) }
}

#[async_trait]
impl FileSourceConnector for CsvConnector {
    async fn parse(&self, file: &SourceFile, table_id: Uuid, form: Option<&FormData>) -> FrameResult<ParsedFile> {
        let sep = delimiter(file, form)?;
        let df = CsvReadOptions::default()
            .with_has_header(has_header(form))
            .with_parse_options(CsvParseOptions::default().with_separator(sep).with_try_parse_dates(true))
            .into_reader_with_file_handle(Cursor::new(file.bytes.clone()))
            .finish()
            .map_err(|e| FrameError::parse("csv_parse", format!("{}: {}", file.name, e)))?;
        store_parsed_frame(self.storage.as_ref(), df, table_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnType;
    use crate::storage::MemoryStorage;

    fn connector() -> (Arc<MemoryStorage>, CsvConnector) {
        let storage = Arc::new(MemoryStorage::new());
        (storage.clone(), CsvConnector::new(storage))
    }

    #[tokio::test]
    async fn parses_header_types_and_stores_frame() {
        let (storage, c) = connector();
        let table = Uuid::new_v4();
        let csv = "region,revenue,active,day\nnorth,10.5,true,2024-01-01\nsouth,3,false,2024-01-02\n";
        let parsed = c.parse(&SourceFile::new("sales.csv", csv.as_bytes().to_vec()), table, None).await.unwrap();
        assert_eq!(parsed.row_count, 2);
        assert_eq!(parsed.column_count, 4);
        let names: Vec<&str> = parsed.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["region", "revenue", "active", "day"]);
        assert!(parsed.fields.iter().all(|f| f.table_id == table));
        assert_eq!(parsed.fields[0].column_type, ColumnType::String);
        assert_eq!(parsed.fields[1].column_type, ColumnType::Number);
        assert_eq!(parsed.fields[2].column_type, ColumnType::Boolean);
        assert_eq!(parsed.fields[3].column_type, ColumnType::Date);
        let ids: Vec<Uuid> = parsed.fields.iter().map(|f| f.id).collect();
        assert_eq!(parsed.data_frame.field_ids(), ids.as_slice());
        assert!(storage.exists(parsed.data_frame.storage().key()).await.unwrap());
    }

    #[tokio::test]
    async fn semicolon_delimiter_from_form() {
        let (_s, c) = connector();
        let mut form = FormData::new();
        form.insert("delimiter".into(), ";".into());
        let parsed = c.parse(&SourceFile::new("x.csv", b"a;b\n1;2\n".to_vec()), Uuid::new_v4(), Some(&form)).await.unwrap();
        assert_eq!(parsed.column_count, 2);
        assert_eq!(parsed.source_schema.columns[1].name, "b");
    }

    #[test]
    fn delimiter_rules() {
        let f = SourceFile::new("x.tsv", vec![]);
        assert_eq!(delimiter(&f, None).unwrap(), b'\t');
        let mut form = FormData::new();
        form.insert("delimiter".into(), "||".into());
        assert!(delimiter(&f, Some(&form)).is_err());
        form.insert("delimiter".into(), "tab".into());
        assert_eq!(delimiter(&SourceFile::new("x.csv", vec![]), Some(&form)).unwrap(), b'\t');
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_storing() {
        let (storage, c) = connector();
        let res = c.parse(&SourceFile::new("empty.csv", Vec::new()), Uuid::new_v4(), None).await;
        assert!(res.is_err());
        assert!(storage.is_empty());
    }
}
