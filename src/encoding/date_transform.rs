//! Date grouping for field encodings.
//!
//! Temporal aggregations truncate and keep time ordering; categorical ones extract a named
//! period and turn the axis ordinal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AxisType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum DateAggregation {
    #[default]
    None,
    Year,
    YearQuarter,
    YearMonth,
    YearWeek,
    YearMonthDay,
    Month,
    DayOfWeek,
    Quarter,
}

impl DateAggregation {
    /// `date_trunc` unit for temporal aggregations.
    pub fn trunc_unit(&self) -> Option<&'static str> {
        match self {
            DateAggregation::Year => Some("year"),
            DateAggregation::YearQuarter => Some("quarter"),
            DateAggregation::YearMonth => Some("month"),
            DateAggregation::YearWeek => Some("week"),
            DateAggregation::YearMonthDay => Some("day"),
            _ => None,
        }
    }

    /// Extraction function for categorical aggregations.
    pub fn extract_function(&self) -> Option<&'static str> {
        match self {
            DateAggregation::Month => Some("monthname"),
            DateAggregation::DayOfWeek => Some("dayname"),
            DateAggregation::Quarter => Some("quarter"),
            _ => None,
        }
    }

    pub fn is_categorical(&self) -> bool {
        self.extract_function().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTransform {
    pub sql: String,
    pub axis_type: AxisType,
}

/// Wrap `column_sql` for `aggregation`. `None` passes the column and axis through.
pub fn apply_date_transform(column_sql: &str, aggregation: DateAggregation, axis_type: AxisType) -> DateTransform {
    if let Some(unit) = aggregation.trunc_unit() {
        return DateTransform { sql: format!("date_trunc('{}', {})", unit, column_sql), axis_type: AxisType::Temporal };
    }
    if let Some(func) = aggregation.extract_function() {
        return DateTransform { sql: format!("{}({})", func, column_sql), axis_type: AxisType::Ordinal };
    }
    DateTransform { sql: column_sql.to_string(), axis_type }
}

const WEEKLY_BELOW_DAYS: i64 = 14;
const MONTHLY_BELOW_DAYS: i64 = 180;
const YEARLY_FROM_DAYS: i64 = 1825;

/// Granularity that keeps a time axis around 20 to 100 points.
pub fn select_temporal_aggregation(min: Option<DateTime<Utc>>, max: Option<DateTime<Utc>>) -> DateAggregation {
    let (Some(min), Some(max)) = (min, max) else {
        return DateAggregation::YearMonth;
    };
    let days = (max - min).num_days().abs();
    if days < WEEKLY_BELOW_DAYS {
        DateAggregation::None
    } else if days < MONTHLY_BELOW_DAYS {
        DateAggregation::YearWeek
    } else if days < YEARLY_FROM_DAYS {
        DateAggregation::YearMonth
    } else {
        DateAggregation::Year
    }
}
