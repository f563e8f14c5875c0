//! SQL rendering primitives: identifier quoting, literals, predicates and ordering.
//! Identifiers are always double-quoted; string literals are single-quoted.

use serde::{Deserialize, Serialize};

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `"table"."column"`.
pub fn qualified_ident(table: &str, column: &str) -> String {
    format!("{}.{}", quote_ident(table), quote_ident(column))
}

/// Single-quote a string literal, doubling embedded quotes.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
}

impl FilterOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::NotEq => "!=",
            FilterOp::Gt => ">",
            FilterOp::GtEq => ">=",
            FilterOp::Lt => "<",
            FilterOp::LtEq => "<=",
            FilterOp::Like => "LIKE",
            FilterOp::In => "IN",
            FilterOp::IsNull => "IS NULL",
            FilterOp::IsNotNull => "IS NOT NULL",
        }
    }

    /// Unary operators take no right-hand value.
    pub fn is_unary(&self) -> bool {
        matches!(self, FilterOp::IsNull | FilterOp::IsNotNull)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<FilterValue>),
}

impl FilterValue {
    pub fn to_sql(&self) -> String {
        match self {
            FilterValue::Null => "NULL".to_string(),
            FilterValue::Bool(true) => "TRUE".to_string(),
            FilterValue::Bool(false) => "FALSE".to_string(),
            FilterValue::Int(i) => i.to_string(),
            FilterValue::Float(f) if f.is_finite() => f.to_string(),
            FilterValue::Float(_) => "NULL".to_string(),
            FilterValue::Text(s) => quote_literal(s),
            FilterValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_sql()).collect();
                format!("({})", parts.join(", "))
            }
        }
    }
}

impl From<bool> for FilterValue { fn from(v: bool) -> Self { FilterValue::Bool(v) } }
impl From<i64> for FilterValue { fn from(v: i64) -> Self { FilterValue::Int(v) } }
impl From<i32> for FilterValue { fn from(v: i32) -> Self { FilterValue::Int(v as i64) } }
impl From<f64> for FilterValue { fn from(v: f64) -> Self { FilterValue::Float(v) } }
impl From<&str> for FilterValue { fn from(v: &str) -> Self { FilterValue::Text(v.to_string()) } }
impl From<String> for FilterValue { fn from(v: String) -> Self { FilterValue::Text(v) } }
impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self { FilterValue::List(v.into_iter().map(Into::into).collect()) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub column: String,
    pub op: FilterOp,
    #[serde(default = "null_value")]
    pub value: FilterValue,
}

fn null_value() -> FilterValue { FilterValue::Null }

impl FilterPredicate {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<FilterValue>) -> Self {
        Self { column: column.into(), op, value: value.into() }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self { column: column.into(), op: FilterOp::IsNull, value: FilterValue::Null }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self { column: column.into(), op: FilterOp::IsNotNull, value: FilterValue::Null }
    }

    pub fn to_sql(&self) -> String {
        let col = quote_ident(&self.column);
        if self.op.is_unary() {
            return format!("{} {}", col, self.op.as_sql());
        }
        match (&self.op, &self.value) {
            (FilterOp::In, FilterValue::List(items)) if items.is_empty() => "FALSE".to_string(),
            (FilterOp::In, FilterValue::List(_)) => format!("{} IN {}", col, self.value.to_sql()),
            (FilterOp::In, single) => format!("{} IN ({})", col, single.to_sql()),
            (op, value) => format!("{} {} {}", col, op.as_sql(), value.to_sql()),
        }
    }
}

/// Predicates joined with `AND`; `None` when there are none.
pub fn where_clause(filters: &[FilterPredicate]) -> Option<String> {
    if filters.is_empty() { return None; }
    let parts: Vec<String> = filters.iter().map(|f| f.to_sql()).collect();
    Some(format!("WHERE {}", parts.join(" AND ")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(column: impl Into<String>) -> Self { Self { column: column.into(), direction: SortDirection::Asc } }
    pub fn desc(column: impl Into<String>) -> Self { Self { column: column.into(), direction: SortDirection::Desc } }

    pub fn to_sql(&self) -> String {
        let dir = match self.direction { SortDirection::Asc => "ASC", SortDirection::Desc => "DESC" };
        format!("{} {}", quote_ident(&self.column), dir)
    }
}

pub fn order_by_clause(sort: &[SortSpec]) -> Option<String> {
    if sort.is_empty() { return None; }
    let parts: Vec<String> = sort.iter().map(|s| s.to_sql()).collect();
    Some(format!("ORDER BY {}", parts.join(", ")))
}
