//! Criterion benchmarks for plan_storage

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use plan_storage::extension::{
    ConditionScope, NumberValue, ProviderInformation, ProviderKey,
    StorePlayerBooleanResultTransaction, StorePlayerNumberResultTransaction,
    StorePluginTransaction, StoreProviderTransaction,
};
use plan_storage::prelude::*;
use tokio::runtime::Runtime;

const SERVER: &str = "3d2a7a08-9a3f-4b5c-8f1e-0c6a1a2b3c4d";

fn player(n: usize) -> String {
    format!("b1f0c8c2-1d4e-4a43-9d8f-{:012}", n)
}

// ============================================================================
// Statement Building Benchmarks
// ============================================================================

fn bench_statements(c: &mut Criterion) {
    let mut group = c.benchmark_group("statements");
    group.throughput(Throughput::Elements(1));

    group.bench_function("executable_bind", |b| {
        b.iter(|| {
            let exec = Executable::new(
                "INSERT INTO plan_sessions (user_id, server_id, session_start, session_end) VALUES (?, ?, ?, ?)",
            )
            .bind(black_box(1i64))
            .bind(black_box(2i64))
            .bind(black_box(1_700_000_000_000i64))
            .bind(black_box(1_700_000_360_000i64));
            black_box(exec)
        });
    });

    for rows in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("batch_rows", rows), &rows, |b, &rows| {
            b.iter(|| {
                let mut batch =
                    BatchExecutable::new("INSERT INTO plan_tps (server_id, date, tps) VALUES (?, ?, ?)");
                for i in 0..rows {
                    batch.add_row(vec![1i64.into(), (i as i64).into(), 19.9f64.into()]);
                }
                black_box(batch)
            });
        });
    }

    group.bench_function("conditions_sql", |b| {
        b.iter(|| {
            black_box(ConditionScope::Player.satisfied_conditions_sql(black_box(Dialect::Mysql)))
        });
    });

    group.finish();
}

// ============================================================================
// SQLite Transaction Benchmarks
// ============================================================================

async fn prepared_database(dir: &tempfile::TempDir) -> Database {
    let db = Database::open(&DatabaseConfig::sqlite(dir.path().join("bench.db")))
        .await
        .unwrap();
    db.migrate().await.unwrap();
    db.execute_transaction(&mut StorePluginTransaction::new("Jobs", SERVER))
        .await
        .unwrap();
    for (name, condition) in [("level", None), ("employed", Some("employed"))] {
        db.execute_transaction(&mut StoreProviderTransaction::new(
            SERVER,
            ProviderInformation {
                plugin_name: "Jobs".to_string(),
                name: name.to_string(),
                text: name.to_string(),
                provided_condition: condition.map(str::to_string),
                ..Default::default()
            },
        ))
        .await
        .unwrap();
    }
    db
}

fn bench_sqlite(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let db = rt.block_on(prepared_database(&dir));

    let mut group = c.benchmark_group("sqlite");
    group.throughput(Throughput::Elements(1));

    let mut n = 0usize;
    group.bench_function("store_number_result", |b| {
        b.to_async(&rt).iter(|| {
            n += 1;
            let mut tx = StorePlayerNumberResultTransaction::new(
                ProviderKey::new("Jobs", SERVER, "level"),
                player(n % 100),
                NumberValue::Long(n as i64),
            );
            let db = &db;
            async move { db.execute_transaction(&mut tx).await.unwrap() }
        });
    });

    let mut n = 0usize;
    group.bench_function("store_boolean_result", |b| {
        b.to_async(&rt).iter(|| {
            n += 1;
            let mut tx = StorePlayerBooleanResultTransaction::new(
                ProviderKey::new("Jobs", SERVER, "employed"),
                player(n % 100),
                n % 2 == 0,
            );
            let db = &db;
            async move { db.execute_transaction(&mut tx).await.unwrap() }
        });
    });

    group.bench_function("count_values", |b| {
        b.to_async(&rt).iter(|| async {
            let count = db
                .query(Query::count("SELECT COUNT(1) as c FROM plan_extension_user_values"))
                .await
                .unwrap();
            black_box(count)
        });
    });

    group.finish();
    rt.block_on(db.close()).unwrap();
}

criterion_group!(benches, bench_statements, bench_sqlite);
criterion_main!(benches);
