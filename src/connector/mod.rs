//! Connector capability model.
//!
//! A connector is a strategy object that brings data in: file connectors parse a local
//! file into a stored frame, remote API connectors fetch tables from a service. Beyond
//! identity and form metadata every capability is optional and discovered through the
//! `as_*` casts, so new connectors opt in by overriding the cast for what they implement.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::dataframe::DataFrame;
use crate::engine::convert::{column_type_of, frame_to_ipc};
use crate::error::{FrameError, FrameResult};
use crate::model::{ColumnType, Field};
use crate::planner::{Query, QueryOperation};
use crate::storage::DataFrameStorage;

pub mod csv;
pub mod json;

pub use self::csv::CsvConnector;
pub use self::json::JsonConnector;

/// Values entered in a connector's configuration form, keyed by form field name.
pub type FormData = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectorKind {
    File,
    RemoteApi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormFieldKind {
    Text,
    Password,
    Number,
    Boolean,
    Select,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub kind: FormFieldKind,
    #[serde(default)]
    pub required: bool,
    /// Secret values are encrypted at rest by the caller.
    #[serde(default)]
    pub secret: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl FormField {
    pub fn text(name: &str, label: &str) -> Self {
        Self { name: name.into(), label: label.into(), kind: FormFieldKind::Text, required: false, secret: false, default_value: None }
    }

    pub fn required(mut self) -> Self { self.required = true; self }

    pub fn with_default(mut self, v: &str) -> Self { self.default_value = Some(v.into()); self }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: ConnectorKind,
    #[serde(default)]
    pub form: Vec<FormField>,
    /// File extensions accepted by file connectors, lowercase without the dot.
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// A file handed to a file connector.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }

    pub fn extension(&self) -> Option<String> {
        self.name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Column layout as found in the source, before it is mapped onto fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SourceSchema {
    pub columns: Vec<SourceColumn>,
}

#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub data_frame: DataFrame,
    pub fields: Vec<Field>,
    pub source_schema: SourceSchema,
    pub row_count: usize,
    pub column_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTable {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDatabase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tables: Vec<RemoteTable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RemoteQueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RemoteFetch {
    pub data_frame: DataFrame,
    pub fields: Vec<Field>,
}

/// Identity and configuration metadata shared by every connector.
pub trait Connector: Send + Sync {
    fn info(&self) -> &ConnectorInfo;

    fn as_file_source(&self) -> Option<&dyn FileSourceConnector> { None }

    fn as_remote_api(&self) -> Option<&dyn RemoteApiConnector> { None }

    fn as_push_down(&self) -> Option<&dyn QueryPushDownCapable> { None }
}

#[async_trait]
pub trait FileSourceConnector: Send + Sync {
    /// Parse `file` into a stored frame for table `table_id`. Any failure rejects the whole
    /// parse; no partial frame is produced.
    async fn parse(&self, file: &SourceFile, table_id: Uuid, form: Option<&FormData>) -> FrameResult<ParsedFile>;
}

/// Remote sources. Both calls are stateless: credentials travel in `form` every time.
#[async_trait]
pub trait RemoteApiConnector: Send + Sync {
    async fn connect(&self, form: &FormData) -> FrameResult<Vec<RemoteDatabase>>;

    async fn query(
        &self,
        database_id: &str,
        table_id: &str,
        form: &FormData,
        options: Option<RemoteQueryOptions>,
    ) -> FrameResult<RemoteFetch>;
}

/// Connectors that can execute part or all of a `Query` at the source.
#[async_trait]
pub trait QueryPushDownCapable: Send + Sync {
    fn supports_query_push_down(&self) -> bool;

    fn supported_operations(&self) -> BTreeSet<QueryOperation>;

    /// Definitive answer when the connector can judge a specific query; `None` defers to
    /// `supported_operations`.
    fn can_fully_push_down(&self, _query: &Query) -> Option<bool> { None }

    async fn execute_query(&self, query: &Query, form: &FormData) -> FrameResult<RemoteFetch>;
}

pub fn is_query_push_down_capable(connector: &dyn Connector) -> bool {
    connector.as_push_down().is_some()
}

/// Non-empty form value for `key`.
pub(crate) fn form_value<'a>(form: Option<&'a FormData>, key: &str) -> Option<&'a str> {
    form.and_then(|f| f.get(key)).map(|s| s.as_str()).filter(|s| !s.is_empty())
}

/// Persist a parsed polars frame and describe it as fields of `table_id`.
pub(crate) async fn store_parsed_frame(
    storage: &dyn DataFrameStorage,
    mut df: polars::prelude::DataFrame,
    table_id: Uuid,
) -> FrameResult<ParsedFile> {
    if df.width() == 0 {
        return Err(FrameError::parse("empty_source", "source contains no columns"));
    }
    let mut fields = Vec::with_capacity(df.width());
    let mut columns = Vec::with_capacity(df.width());
    for col in df.get_columns() {
        let name = col.name().to_string();
        let column_type = column_type_of(col.dtype());
        fields.push(Field::new(name.clone(), table_id, column_type).with_column(name.clone()));
        columns.push(SourceColumn { name, column_type });
    }
    let row_count = df.height();
    let column_count = df.width();
    let bytes = frame_to_ipc(&mut df)?;
    let field_ids = fields.iter().map(|f| f.id).collect();
    let data_frame = DataFrame::create(storage, &bytes, field_ids, None).await?;
    info!(target: "framequery::connector", "parsed source: table={} frame={} rows={} cols={}",
        table_id, data_frame.id(), row_count, column_count);
    Ok(ParsedFile { data_frame, fields, source_schema: SourceSchema { columns }, row_count, column_count })
}
