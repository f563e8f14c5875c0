use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use uuid::Uuid;

use framequery::fields::{compute_combined_fields, shorten_table_name};
use framequery::model::{ColumnType, DataTable, Field, JoinSpec, JoinType};
use framequery::query::{batch_sql, FilterOp, JoinClause, SortSpec};
use framequery::storage::MemoryStorage;
use framequery::{DataFrame, PolarsEngine, QueryBuilder, StorageLocation};

fn builder() -> QueryBuilder {
    let engine = Arc::new(PolarsEngine::new(Arc::new(MemoryStorage::new())));
    let frame = DataFrame::new(StorageLocation::local("bench"), vec![Uuid::new_v4(); 8], None);
    QueryBuilder::new(engine, frame, "sales")
}

fn table(name: &str, n: usize) -> DataTable {
    let id = Uuid::new_v4();
    let fields = (0..n).map(|i| Field::new(format!("col_{}", i), id, ColumnType::Number)).collect();
    DataTable { id, name: name.to_string(), fields, data_frame_id: None }
}

fn bench_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder");
    let base = builder()
        .select(["region", "revenue", "day"])
        .join(JoinClause::new("customers", "customer_id", "id", JoinType::Left));

    group.bench_function("chain_and_render", |b| {
        b.iter(|| {
            base.filter_where("revenue", FilterOp::Gt, 100)
                .filter_where("region", FilterOp::In, vec!["north", "south", "east"])
                .sort(SortSpec::desc("revenue"))
                .limit(50)
                .sql()
        })
    });
    group.bench_function("count_sql", |b| b.iter(|| base.filter_where("active", FilterOp::Eq, true).count_sql()));

    for n in [2usize, 8, 32] {
        let queries: Vec<String> = (0..n).map(|i| base.filter_where("bucket", FilterOp::Eq, i as i64).sql()).collect();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("batch_sql", n), &queries, |b, q| b.iter(|| batch_sql(q)));
    }
    group.finish();
}

fn bench_fields(c: &mut Criterion) {
    let mut group = c.benchmark_group("fields");
    for n in [10usize, 100, 1000] {
        let base = table("orders_1700000000123", n);
        let others: Vec<DataTable> = (0..4).map(|i| table(&format!("lookup_{}_a1b2c3", i), n / 2)).collect();
        let joins: Vec<JoinSpec> = others
            .iter()
            .map(|t| JoinSpec { right_table_id: t.id, left_key: "col_0".into(), right_key: "col_0".into(), join_type: JoinType::Left })
            .collect();
        group.throughput(Throughput::Elements((n * 3) as u64));
        group.bench_with_input(BenchmarkId::new("combine", n), &n, |b, _| {
            b.iter(|| compute_combined_fields(&base, &joins, &others))
        });
    }
    group.bench_function("shorten_table_name", |b| b.iter(|| shorten_table_name("export 2024-01-15T10-30-00_a1b2c3d4.csv")));
    group.finish();
}

criterion_group!(benches, bench_sql, bench_fields);
criterion_main!(benches);
