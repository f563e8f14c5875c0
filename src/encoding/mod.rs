//! Encoding strings and their resolution to SQL.
//!
//! Chart configuration stores axis bindings as `field:<uuid>` or `metric:<uuid>`. Anything
//! else is an invalid encoding. A well-formed reference whose target no longer exists is a
//! missing reference and resolves to an empty expression so callers can render it as such.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fields::CombinedField;
use crate::model::{ColumnType, Field, Metric, MetricAggregation};
use crate::query::quote_ident;

pub mod date_transform;

pub use date_transform::{apply_date_transform, select_temporal_aggregation, DateAggregation, DateTransform};

const FIELD_PREFIX: &str = "field:";
const METRIC_PREFIX: &str = "metric:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingRef {
    Field(Uuid),
    Metric(Uuid),
}

impl EncodingRef {
    pub fn id(&self) -> Uuid {
        match self {
            EncodingRef::Field(id) | EncodingRef::Metric(id) => *id,
        }
    }
}

impl fmt::Display for EncodingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingRef::Field(id) => write!(f, "{}{}", FIELD_PREFIX, id),
            EncodingRef::Metric(id) => write!(f, "{}{}", METRIC_PREFIX, id),
        }
    }
}

impl FromStr for EncodingRef {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_encoding(s).ok_or(())
    }
}

/// Typed reference for a `field:`/`metric:` string; `None` for anything else.
pub fn parse_encoding(encoding: &str) -> Option<EncodingRef> {
    if let Some(rest) = encoding.strip_prefix(FIELD_PREFIX) {
        return Uuid::parse_str(rest).ok().map(EncodingRef::Field);
    }
    if let Some(rest) = encoding.strip_prefix(METRIC_PREFIX) {
        return Uuid::parse_str(rest).ok().map(EncodingRef::Metric);
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisType {
    Quantitative,
    Temporal,
    Ordinal,
    Nominal,
}

impl From<ColumnType> for AxisType {
    fn from(t: ColumnType) -> Self {
        match t {
            ColumnType::Number => AxisType::Quantitative,
            ColumnType::Date => AxisType::Temporal,
            ColumnType::String | ColumnType::Boolean | ColumnType::Unknown => AxisType::Nominal,
        }
    }
}

/// Catalog an encoding is resolved against. `combined` supplies join-aware display names.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodingContext<'a> {
    pub fields: &'a [Field],
    pub metrics: &'a [Metric],
    pub combined: &'a [CombinedField],
}

impl<'a> EncodingContext<'a> {
    pub fn new(fields: &'a [Field], metrics: &'a [Metric]) -> Self {
        Self { fields, metrics, combined: &[] }
    }

    pub fn with_combined(mut self, combined: &'a [CombinedField]) -> Self {
        self.combined = combined;
        self
    }

    fn field(&self, id: &Uuid) -> Option<&'a Field> {
        self.combined
            .iter()
            .map(|c| &c.field)
            .chain(self.fields.iter())
            .find(|f| &f.id == id)
    }

    fn metric(&self, id: &Uuid) -> Option<&'a Metric> {
        self.metrics.iter().find(|m| &m.id == id)
    }

    fn display_name(&self, field: &Field) -> String {
        self.combined
            .iter()
            .find(|c| c.field.id == field.id)
            .map(|c| c.display_name.clone())
            .unwrap_or_else(|| field.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingResolution {
    pub valid: bool,
    #[serde(skip)]
    pub reference: Option<EncodingRef>,
    pub sql: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis_type: Option<AxisType>,
}

impl EncodingResolution {
    fn invalid(reference: Option<EncodingRef>) -> Self {
        Self { valid: false, reference, sql: String::new(), display_name: String::new(), axis_type: None }
    }
}

/// Aggregate expression for `metric`, e.g. `sum("revenue")` or `count(*)`.
pub fn metric_sql(metric: &Metric) -> String {
    if metric.is_row_count() {
        return "count(*)".to_string();
    }
    let column = quote_ident(metric.column_name.as_deref().unwrap_or_default());
    match metric.aggregation {
        MetricAggregation::CountDistinct => format!("count(DISTINCT {})", column),
        agg => format!("{}({})", agg.function_name(), column),
    }
}

/// SQL fragment for `encoding`.
///
/// `None` when the string is not an encoding at all, `Some("")` when the referenced field or
/// metric is gone. A date transform applies to fields only.
pub fn resolve_to_sql(encoding: &str, ctx: &EncodingContext<'_>, date: Option<DateAggregation>) -> Option<String> {
    let reference = parse_encoding(encoding)?;
    Some(resolve_reference(reference, ctx, date).sql)
}

/// Full resolution with display name and axis type.
pub fn resolve_encoding(encoding: &str, ctx: &EncodingContext<'_>, date: Option<DateAggregation>) -> EncodingResolution {
    match parse_encoding(encoding) {
        Some(reference) => resolve_reference(reference, ctx, date),
        None => EncodingResolution::invalid(None),
    }
}

fn resolve_reference(reference: EncodingRef, ctx: &EncodingContext<'_>, date: Option<DateAggregation>) -> EncodingResolution {
    match reference {
        EncodingRef::Field(id) => {
            let Some(field) = ctx.field(&id) else {
                return EncodingResolution::invalid(Some(reference));
            };
            let column = quote_ident(field.column());
            let t = apply_date_transform(&column, date.unwrap_or_default(), field.column_type.into());
            EncodingResolution {
                valid: true,
                reference: Some(reference),
                sql: t.sql,
                display_name: ctx.display_name(field),
                axis_type: Some(t.axis_type),
            }
        }
        EncodingRef::Metric(id) => match ctx.metric(&id) {
            Some(metric) => EncodingResolution {
                valid: true,
                reference: Some(reference),
                sql: metric_sql(metric),
                display_name: metric.name.clone(),
                axis_type: Some(AxisType::Quantitative),
            },
            None => EncodingResolution::invalid(Some(reference)),
        },
    }
}
