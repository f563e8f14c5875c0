//! Execution strategy selection.
//!
//! `QueryPlanner::plan` decides, per query, whether the rows are already local, whether the
//! connector can answer the whole query at the source, or whether raw data has to be fetched
//! first and the query run locally. Planning is pure: it consults the cache index and the
//! connector's advertised capabilities and never touches the network.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connector::Connector;
use crate::dataframe::DataFrame;
use crate::storage::CacheLookup;

mod query;

pub use query::{Query, QueryAggregation, QueryOperation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocalReason {
    DataCached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemoteReason {
    PushDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HybridReason {
    NotCached,
    ConnectorLimitation,
    PartialPushDown,
}

/// Operation kinds a connector may apply while fetching, ahead of local execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PushableOperation {
    Filter,
    Sort,
    Limit,
    Offset,
}

impl PushableOperation {
    pub const ALL: [PushableOperation; 4] =
        [PushableOperation::Filter, PushableOperation::Sort, PushableOperation::Limit, PushableOperation::Offset];

    pub fn operation(&self) -> QueryOperation {
        match self {
            PushableOperation::Filter => QueryOperation::Filter,
            PushableOperation::Sort => QueryOperation::Sort,
            PushableOperation::Limit => QueryOperation::Limit,
            PushableOperation::Offset => QueryOperation::Offset,
        }
    }
}

#[derive(Clone)]
pub enum ExecutionPlan {
    Local {
        reason: LocalReason,
    },
    Remote {
        reason: RemoteReason,
        connector: Arc<dyn Connector>,
        remote_query: Query,
    },
    Hybrid {
        reason: HybridReason,
        fetch_first: bool,
        connector: Option<Arc<dyn Connector>>,
        remote_operations: Option<Vec<PushableOperation>>,
    },
}

impl ExecutionPlan {
    pub fn strategy(&self) -> &'static str {
        match self {
            ExecutionPlan::Local { .. } => "local",
            ExecutionPlan::Remote { .. } => "remote",
            ExecutionPlan::Hybrid { .. } => "hybrid",
        }
    }

    pub fn is_local(&self) -> bool { matches!(self, ExecutionPlan::Local { .. }) }

    pub fn connector(&self) -> Option<&Arc<dyn Connector>> {
        match self {
            ExecutionPlan::Local { .. } => None,
            ExecutionPlan::Remote { connector, .. } => Some(connector),
            ExecutionPlan::Hybrid { connector, .. } => connector.as_ref(),
        }
    }
}

impl fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connector_id = self.connector().map(|c| c.info().id.clone());
        match self {
            ExecutionPlan::Local { reason } => f.debug_struct("Local").field("reason", reason).finish(),
            ExecutionPlan::Remote { reason, remote_query, .. } => f
                .debug_struct("Remote")
                .field("reason", reason)
                .field("connector", &connector_id)
                .field("remote_query", remote_query)
                .finish(),
            ExecutionPlan::Hybrid { reason, fetch_first, remote_operations, .. } => f
                .debug_struct("Hybrid")
                .field("reason", reason)
                .field("fetch_first", fetch_first)
                .field("connector", &connector_id)
                .field("remote_operations", remote_operations)
                .finish(),
        }
    }
}

pub struct QueryPlanner {
    cache: Arc<dyn CacheLookup>,
}

impl QueryPlanner {
    pub fn new(cache: Arc<dyn CacheLookup>) -> Self {
        Self { cache }
    }

    pub fn is_cached(&self, frame: &DataFrame) -> bool {
        self.cache.is_cached(&frame.id())
    }

    pub fn plan(&self, query: &Query, frame: &DataFrame, connector: Option<Arc<dyn Connector>>) -> ExecutionPlan {
        let plan = self.decide(query, frame, connector);
        debug!(target: "framequery::planner", frame = %frame.id(), plan = ?plan, "planned query");
        plan
    }

    fn decide(&self, query: &Query, frame: &DataFrame, connector: Option<Arc<dyn Connector>>) -> ExecutionPlan {
        if self.is_cached(frame) {
            return ExecutionPlan::Local { reason: LocalReason::DataCached };
        }
        let Some(connector) = connector else {
            return ExecutionPlan::Hybrid {
                reason: HybridReason::NotCached,
                fetch_first: true,
                connector: None,
                remote_operations: None,
            };
        };

        let (supported, full) = match connector.as_push_down() {
            Some(cap) if cap.supports_query_push_down() => {
                let supported = cap.supported_operations();
                let full = cap.can_fully_push_down(query).unwrap_or_else(|| query.operations().is_subset(&supported));
                (supported, full)
            }
            _ => {
                return ExecutionPlan::Hybrid {
                    reason: HybridReason::ConnectorLimitation,
                    fetch_first: true,
                    connector: Some(connector),
                    remote_operations: None,
                };
            }
        };

        if full {
            // a connector that vouches for the query gets all of it
            let remote_query = if query.operations().is_subset(&supported) { query.restrict_to(&supported) } else { query.clone() };
            return ExecutionPlan::Remote { reason: RemoteReason::PushDown, connector, remote_query };
        }

        let pushable = pushable_operations(query, &supported);
        ExecutionPlan::Hybrid {
            reason: HybridReason::PartialPushDown,
            fetch_first: true,
            connector: Some(connector),
            remote_operations: if pushable.is_empty() { None } else { Some(pushable) },
        }
    }
}

/// Fetch-time operations that are both present in `query` and supported remotely.
///
/// Paging is pushable only when every row-shaping operation before it also runs remotely.
fn pushable_operations(query: &Query, supported: &BTreeSet<QueryOperation>) -> Vec<PushableOperation> {
    let present = query.operations();
    let shaping_remote = present
        .iter()
        .filter(|op| !matches!(op, QueryOperation::Select | QueryOperation::Limit | QueryOperation::Offset))
        .all(|op| supported.contains(op));
    PushableOperation::ALL
        .into_iter()
        .filter(|p| present.contains(&p.operation()) && supported.contains(&p.operation()))
        .filter(|p| shaping_remote || matches!(p, PushableOperation::Filter | PushableOperation::Sort))
        .collect()
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod planner_tests;
