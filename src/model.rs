//! Catalog contracts shared by connectors, the encoding resolver and the field merger.
//! Keep this module about types/serde and light helpers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marker prefix for engine-internal columns that never surface in user-facing views.
pub const INTERNAL_FIELD_PREFIX: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Boolean,
    Date,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: Uuid,
    pub name: String,
    pub table_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
}

impl Field {
    pub fn new(name: impl Into<String>, table_id: Uuid, column_type: ColumnType) -> Self {
        Self { id: Uuid::new_v4(), name: name.into(), table_id, column_name: None, column_type }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column_name = Some(column.into());
        self
    }

    /// Physical column backing this field: `column_name`, else `name`.
    pub fn column(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_internal(&self) -> bool {
        self.name.starts_with(INTERNAL_FIELD_PREFIX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricAggregation {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
    Median,
}

impl MetricAggregation {
    pub fn function_name(&self) -> &'static str {
        match self {
            MetricAggregation::Count | MetricAggregation::CountDistinct => "count",
            MetricAggregation::Sum => "sum",
            MetricAggregation::Avg => "avg",
            MetricAggregation::Min => "min",
            MetricAggregation::Max => "max",
            MetricAggregation::Median => "median",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub id: Uuid,
    pub name: String,
    pub table_id: Uuid,
    /// Absent for row-count metrics, which have no analyzable column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    pub aggregation: MetricAggregation,
}

impl Metric {
    pub fn is_row_count(&self) -> bool {
        self.column_name.is_none()
    }
}

/// One table in the catalog: its display name and the fields it exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTable {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_frame_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    #[default]
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL OUTER JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpec {
    pub right_table_id: Uuid,
    pub left_key: String,
    pub right_key: String,
    #[serde(rename = "type", default)]
    pub join_type: JoinType,
}
