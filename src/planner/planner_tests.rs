use super::*;
use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::connector::{ConnectorInfo, ConnectorKind, FormData, QueryPushDownCapable, RemoteFetch};
use crate::dataframe::StorageLocation;
use crate::error::{FrameError, FrameResult};
use crate::model::MetricAggregation;
use crate::query::{FilterOp, FilterPredicate, SortSpec};
use crate::storage::CacheIndex;

struct PlainConnector {
    info: ConnectorInfo,
}

impl PlainConnector {
    fn new() -> Self {
        Self { info: info("plain") }
    }
}

impl Connector for PlainConnector {
    fn info(&self) -> &ConnectorInfo { &self.info }
}

struct PushDownConnector {
    info: ConnectorInfo,
    enabled: bool,
    ops: BTreeSet<QueryOperation>,
    verdict: Option<bool>,
}

impl PushDownConnector {
    fn new(ops: &[QueryOperation]) -> Self {
        Self { info: info("warehouse"), enabled: true, ops: ops.iter().copied().collect(), verdict: None }
    }
}

impl Connector for PushDownConnector {
    fn info(&self) -> &ConnectorInfo { &self.info }

    fn as_push_down(&self) -> Option<&dyn QueryPushDownCapable> { Some(self) }
}

#[async_trait]
impl QueryPushDownCapable for PushDownConnector {
    fn supports_query_push_down(&self) -> bool { self.enabled }

    fn supported_operations(&self) -> BTreeSet<QueryOperation> { self.ops.clone() }

    fn can_fully_push_down(&self, _query: &Query) -> Option<bool> { self.verdict }

    async fn execute_query(&self, _query: &Query, _form: &FormData) -> FrameResult<RemoteFetch> {
        Err(FrameError::connector("not_wired", "planner tests never execute"))
    }
}

fn info(id: &str) -> ConnectorInfo {
    ConnectorInfo {
        id: id.into(),
        name: id.into(),
        description: String::new(),
        kind: ConnectorKind::RemoteApi,
        form: Vec::new(),
        extensions: Vec::new(),
    }
}

fn frame() -> DataFrame {
    DataFrame::new(StorageLocation::local("k"), vec![Uuid::new_v4()], None)
}

fn filtered_sorted(frame: &DataFrame) -> Query {
    Query {
        filters: vec![FilterPredicate::new("region", FilterOp::Eq, "north")],
        order_by: vec![SortSpec::desc("revenue")],
        limit: Some(50),
        ..Query::for_frame(frame.id())
    }
}

fn planner(cache: &CacheIndex) -> QueryPlanner {
    QueryPlanner::new(Arc::new(cache.clone()))
}

#[test]
fn test_cached_frame_is_always_local() {
    let cache = CacheIndex::new();
    let f = frame();
    cache.mark_cached(f.id());
    let p = planner(&cache);
    let connector: Arc<dyn Connector> = Arc::new(PushDownConnector::new(&[QueryOperation::Filter]));
    for c in [None, Some(connector)] {
        let plan = p.plan(&filtered_sorted(&f), &f, c);
        assert!(matches!(plan, ExecutionPlan::Local { reason: LocalReason::DataCached }));
        assert_eq!(plan.strategy(), "local");
    }
}

#[test]
fn test_uncached_without_connector_fetches_first() {
    let cache = CacheIndex::new();
    let f = frame();
    let plan = planner(&cache).plan(&Query::for_frame(f.id()), &f, None);
    match plan {
        ExecutionPlan::Hybrid { reason, fetch_first, connector, remote_operations } => {
            assert_eq!(reason, HybridReason::NotCached);
            assert!(fetch_first);
            assert!(connector.is_none());
            assert!(remote_operations.is_none());
        }
        other => panic!("expected hybrid, got {:?}", other),
    }
}

#[test]
fn test_full_coverage_pushes_down() {
    let cache = CacheIndex::new();
    let f = frame();
    let c = PushDownConnector::new(&[QueryOperation::Filter, QueryOperation::Sort, QueryOperation::Limit, QueryOperation::Offset]);
    let q = filtered_sorted(&f);
    match planner(&cache).plan(&q, &f, Some(Arc::new(c))) {
        ExecutionPlan::Remote { reason, connector, remote_query } => {
            assert_eq!(reason, RemoteReason::PushDown);
            assert_eq!(connector.info().id, "warehouse");
            assert_eq!(remote_query, q);
        }
        other => panic!("expected remote, got {:?}", other),
    }
}

#[test]
fn test_partial_coverage_lists_pushable_operations() {
    let cache = CacheIndex::new();
    let f = frame();
    let c = PushDownConnector::new(&[QueryOperation::Filter, QueryOperation::Limit]);
    match planner(&cache).plan(&filtered_sorted(&f), &f, Some(Arc::new(c))) {
        ExecutionPlan::Hybrid { reason, fetch_first, connector, remote_operations } => {
            assert_eq!(reason, HybridReason::PartialPushDown);
            assert!(fetch_first);
            assert!(connector.is_some());
            // sort runs locally, so the limit cannot go first
            assert_eq!(remote_operations, Some(vec![PushableOperation::Filter]));
        }
        other => panic!("expected hybrid, got {:?}", other),
    }
}

#[test]
fn test_partial_coverage_with_nothing_pushable_omits_list() {
    let cache = CacheIndex::new();
    let f = frame();
    let q = Query {
        aggregations: vec![QueryAggregation { column: None, function: MetricAggregation::Count, alias: None }],
        ..Query::for_frame(f.id())
    };
    let c = PushDownConnector::new(&[QueryOperation::Filter]);
    match planner(&cache).plan(&q, &f, Some(Arc::new(c))) {
        ExecutionPlan::Hybrid { reason, remote_operations, .. } => {
            assert_eq!(reason, HybridReason::PartialPushDown);
            assert!(remote_operations.is_none());
        }
        other => panic!("expected hybrid, got {:?}", other),
    }
}

#[test]
fn test_connector_without_capability_is_a_limitation() {
    let cache = CacheIndex::new();
    let f = frame();
    let plan = planner(&cache).plan(&filtered_sorted(&f), &f, Some(Arc::new(PlainConnector::new())));
    assert!(matches!(
        plan,
        ExecutionPlan::Hybrid { reason: HybridReason::ConnectorLimitation, fetch_first: true, connector: Some(_), .. }
    ));
}

#[test]
fn test_disabled_push_down_is_a_limitation() {
    let cache = CacheIndex::new();
    let f = frame();
    let mut c = PushDownConnector::new(&[QueryOperation::Filter, QueryOperation::Sort, QueryOperation::Limit]);
    c.enabled = false;
    let plan = planner(&cache).plan(&filtered_sorted(&f), &f, Some(Arc::new(c)));
    assert!(matches!(plan, ExecutionPlan::Hybrid { reason: HybridReason::ConnectorLimitation, .. }));
}

#[test]
fn test_connector_verdict_overrides_operation_set() {
    let cache = CacheIndex::new();
    let f = frame();
    let q = filtered_sorted(&f);

    let mut confirms = PushDownConnector::new(&[QueryOperation::Filter]);
    confirms.verdict = Some(true);
    match planner(&cache).plan(&q, &f, Some(Arc::new(confirms))) {
        ExecutionPlan::Remote { remote_query, .. } => assert_eq!(remote_query, q),
        other => panic!("expected remote, got {:?}", other),
    }

    let mut vetoes = PushDownConnector::new(&[QueryOperation::Filter, QueryOperation::Sort, QueryOperation::Limit]);
    vetoes.verdict = Some(false);
    let plan = planner(&cache).plan(&q, &f, Some(Arc::new(vetoes)));
    assert!(matches!(plan, ExecutionPlan::Hybrid { reason: HybridReason::PartialPushDown, .. }));
}

#[test]
fn test_plain_query_with_capable_connector_pushes_down() {
    let cache = CacheIndex::new();
    let f = frame();
    let c = PushDownConnector::new(&[]);
    let plan = planner(&cache).plan(&Query::for_frame(f.id()), &f, Some(Arc::new(c)));
    assert_eq!(plan.strategy(), "remote");
    assert_eq!(plan.connector().map(|c| c.info().id.as_str()), Some("warehouse"));
}

#[test]
fn test_query_operations_reflect_present_parts() {
    let f = frame();
    let q = Query { select: Some(vec![]), offset: Some(3), ..filtered_sorted(&f) };
    let ops: Vec<QueryOperation> = q.operations().into_iter().collect();
    assert_eq!(ops, vec![QueryOperation::Filter, QueryOperation::Sort, QueryOperation::Limit, QueryOperation::Offset]);
    let only_filter = q.restrict_to(&[QueryOperation::Filter].into_iter().collect());
    assert_eq!(only_filter.filters.len(), 1);
    assert!(only_filter.order_by.is_empty());
    assert_eq!(only_filter.limit, None);
}
