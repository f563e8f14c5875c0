//! Engine-agnostic query description consumed by the planner and push-down connectors.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::MetricAggregation;
use crate::query::{FilterPredicate, SortSpec};

/// Operation kinds a query may contain and a connector may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryOperation {
    Select,
    Filter,
    Aggregate,
    GroupBy,
    Sort,
    Limit,
    Offset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAggregation {
    /// `None` counts rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub function: MetricAggregation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub frame_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    #[serde(default)]
    pub filters: Vec<FilterPredicate>,
    #[serde(default)]
    pub aggregations: Vec<QueryAggregation>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<SortSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl Query {
    pub fn for_frame(frame_id: Uuid) -> Self {
        Self { frame_id, ..Default::default() }
    }

    /// Operation kinds actually present.
    pub fn operations(&self) -> BTreeSet<QueryOperation> {
        let mut ops = BTreeSet::new();
        if self.select.as_ref().is_some_and(|s| !s.is_empty()) { ops.insert(QueryOperation::Select); }
        if !self.filters.is_empty() { ops.insert(QueryOperation::Filter); }
        if !self.aggregations.is_empty() { ops.insert(QueryOperation::Aggregate); }
        if !self.group_by.is_empty() { ops.insert(QueryOperation::GroupBy); }
        if !self.order_by.is_empty() { ops.insert(QueryOperation::Sort); }
        if self.limit.is_some() { ops.insert(QueryOperation::Limit); }
        if self.offset.is_some() { ops.insert(QueryOperation::Offset); }
        ops
    }

    /// The part of this query expressible with `ops`; everything else is cleared.
    pub fn restrict_to(&self, ops: &BTreeSet<QueryOperation>) -> Query {
        let has = |op: QueryOperation| ops.contains(&op);
        Query {
            frame_id: self.frame_id,
            select: if has(QueryOperation::Select) { self.select.clone() } else { None },
            filters: if has(QueryOperation::Filter) { self.filters.clone() } else { Vec::new() },
            aggregations: if has(QueryOperation::Aggregate) { self.aggregations.clone() } else { Vec::new() },
            group_by: if has(QueryOperation::GroupBy) { self.group_by.clone() } else { Vec::new() },
            order_by: if has(QueryOperation::Sort) { self.order_by.clone() } else { Vec::new() },
            limit: if has(QueryOperation::Limit) { self.limit } else { None },
            offset: if has(QueryOperation::Offset) { self.offset } else { None },
        }
    }
}
