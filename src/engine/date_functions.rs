//! DuckDB date functions on top of polars SQL.
//!
//! Polars SQL has no `date_trunc`, `monthname`, `dayname` or `quarter`. Calls whose argument
//! is a quoted column are replaced by a reference to a derived column, and the derived
//! column is added with `dt()` expressions to every registered table that has the source
//! column. The derived column is named after the call, so unaliased selections read like
//! DuckDB's output (`date_trunc('month', day)`).

use once_cell::sync::Lazy;
use polars::prelude::{self as pl, DataType};
use regex::{Captures, Regex};

use crate::query::sql::quote_ident;

static DATE_TRUNC_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bdate_trunc\s*\(\s*'(?P<unit>year|quarter|month|week|day)'\s*,\s*"(?P<col>(?:[^"]|"")+)"\s*\)"#)
        .expect("valid date_trunc regex")
});

static DATE_NAME_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?P<func>monthname|dayname|quarter)\s*\(\s*"(?P<col>(?:[^"]|"")+)"\s*\)"#)
        .expect("valid date name regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DateFunction {
    Trunc(TruncUnit),
    MonthName,
    DayName,
    Quarter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TruncUnit {
    Year,
    Quarter,
    Month,
    Week,
    Day,
}

impl TruncUnit {
    fn parse(unit: &str) -> Option<Self> {
        match unit.to_ascii_lowercase().as_str() {
            "year" => Some(TruncUnit::Year),
            "quarter" => Some(TruncUnit::Quarter),
            "month" => Some(TruncUnit::Month),
            "week" => Some(TruncUnit::Week),
            "day" => Some(TruncUnit::Day),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TruncUnit::Year => "year",
            TruncUnit::Quarter => "quarter",
            TruncUnit::Month => "month",
            TruncUnit::Week => "week",
            TruncUnit::Day => "day",
        }
    }

    /// Polars duration string; weeks start on Monday as in DuckDB.
    fn every(&self) -> &'static str {
        match self {
            TruncUnit::Year => "1y",
            TruncUnit::Quarter => "1q",
            TruncUnit::Month => "1mo",
            TruncUnit::Week => "1w",
            TruncUnit::Day => "1d",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DerivedDateColumn {
    pub name: String,
    pub source: String,
    pub function: DateFunction,
}

impl DerivedDateColumn {
    fn new(function: DateFunction, source: String) -> Self {
        let name = match function {
            DateFunction::Trunc(unit) => format!("date_trunc('{}', {})", unit.name(), source),
            DateFunction::MonthName => format!("monthname({})", source),
            DateFunction::DayName => format!("dayname({})", source),
            DateFunction::Quarter => format!("quarter({})", source),
        };
        Self { name, source, function }
    }

    pub fn expr(&self) -> pl::Expr {
        let c = pl::col(self.source.as_str());
        let e = match self.function {
            DateFunction::Trunc(unit) => c.dt().truncate(pl::lit(unit.every())),
            DateFunction::MonthName => c.dt().strftime("%B"),
            DateFunction::DayName => c.dt().strftime("%A"),
            DateFunction::Quarter => c.dt().quarter().cast(DataType::Int64),
        };
        e.alias(self.name.as_str())
    }
}

fn unescape_ident(quoted_body: &str) -> String {
    quoted_body.replace("\"\"", "\"")
}

fn remember(derived: &mut Vec<DerivedDateColumn>, col: DerivedDateColumn) -> String {
    let text = quote_ident(&col.name);
    if !derived.contains(&col) {
        derived.push(col);
    }
    text
}

/// Replace supported date calls with derived column references. Calls over anything other
/// than a plain quoted column are left for polars to reject.
pub(crate) fn rewrite_date_functions(sql: &str) -> (String, Vec<DerivedDateColumn>) {
    let mut derived: Vec<DerivedDateColumn> = Vec::new();
    let truncated = DATE_TRUNC_CALL
        .replace_all(sql, |caps: &Captures| match TruncUnit::parse(&caps["unit"]) {
            Some(unit) => remember(&mut derived, DerivedDateColumn::new(DateFunction::Trunc(unit), unescape_ident(&caps["col"]))),
            None => caps[0].to_string(),
        })
        .into_owned();
    let named = DATE_NAME_CALL
        .replace_all(&truncated, |caps: &Captures| {
            let function = match caps["func"].to_ascii_lowercase().as_str() {
                "monthname" => DateFunction::MonthName,
                "dayname" => DateFunction::DayName,
                _ => DateFunction::Quarter,
            };
            remember(&mut derived, DerivedDateColumn::new(function, unescape_ident(&caps["col"])))
        })
        .into_owned();
    (named, derived)
}

/// Add the derived columns whose source exists in `df`.
pub(crate) fn with_derived_columns(df: &pl::DataFrame, derived: &[DerivedDateColumn]) -> pl::LazyFrame {
    let lf = pl::IntoLazy::lazy(df.clone());
    let exprs: Vec<pl::Expr> = derived.iter().filter(|d| df.column(&d.source).is_ok()).map(|d| d.expr()).collect();
    if exprs.is_empty() {
        lf
    } else {
        lf.with_columns(exprs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trunc_and_name_calls_become_column_refs() {
        let (sql, derived) = rewrite_date_functions(
            "SELECT date_trunc('month', \"day\") AS x, sum(\"amount\") FROM \"t\" GROUP BY date_trunc('month', \"day\")",
        );
        assert_eq!(
            sql,
            "SELECT \"date_trunc('month', day)\" AS x, sum(\"amount\") FROM \"t\" GROUP BY \"date_trunc('month', day)\""
        );
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].source, "day");
        assert_eq!(derived[0].function, DateFunction::Trunc(TruncUnit::Month));

        let (sql, derived) = rewrite_date_functions("SELECT monthname(\"d\"), DAYNAME( \"d\" ), quarter(\"d\") FROM \"t\"");
        assert_eq!(sql, "SELECT \"monthname(d)\", \"dayname(d)\", \"quarter(d)\" FROM \"t\"");
        let functions: Vec<DateFunction> = derived.iter().map(|d| d.function).collect();
        assert_eq!(functions, vec![DateFunction::MonthName, DateFunction::DayName, DateFunction::Quarter]);
    }

    #[test]
    fn quarter_unit_is_not_read_as_quarter_call() {
        let (sql, derived) = rewrite_date_functions("SELECT date_trunc('quarter', \"d\") FROM \"t\"");
        assert_eq!(sql, "SELECT \"date_trunc('quarter', d)\" FROM \"t\"");
        assert_eq!(derived.len(), 1);
    }

    #[test]
    fn escaped_column_names_round_trip() {
        let (sql, derived) = rewrite_date_functions("SELECT dayname(\"odd\"\"name\") FROM \"t\"");
        assert_eq!(derived[0].source, "odd\"name");
        assert_eq!(sql, "SELECT \"dayname(odd\"\"name)\" FROM \"t\"");
    }

    #[test]
    fn other_sql_is_untouched() {
        let sql = "SELECT \"quarter\", date_trunc('month', now()) FROM \"t\" WHERE \"x\" > 1";
        let (out, derived) = rewrite_date_functions(sql);
        assert_eq!(out, sql);
        assert!(derived.is_empty());
    }
}
