//! Write benchmarks.
//!
//! Every write outside a transaction rewrites the whole table file, so
//! these mostly measure how much batching in a transaction saves.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fsdb_bench::{json_driver, populated, random_record};
use fsdb_core::{record, Filter, Request};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Benchmark single inserts, each persisting its table.
fn bench_insert_autocommit(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_autocommit");
    let driver = json_driver();

    for count in [10, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let mut fx = populated(&driver, count);
            let mut rng = StdRng::seed_from_u64(1);

            b.iter(|| {
                let request = Request::insert_into("T", random_record(&mut rng));
                black_box(fx.conn.exec(&request).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark batches of inserts inside one transaction.
fn bench_insert_transaction(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_transaction");
    let driver = json_driver();

    for batch_size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let mut fx = populated(&driver, 0);
                let mut rng = StdRng::seed_from_u64(2);

                b.iter(|| {
                    fx.conn.begin().unwrap();
                    for _ in 0..batch_size {
                        let request = Request::insert_into("T", random_record(&mut rng));
                        fx.conn.exec(&request).unwrap();
                    }
                    fx.conn.commit().unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark an update touching roughly an eighth of the table.
fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_where");
    let driver = json_driver();

    for count in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let mut fx = populated(&driver, count);
            let request = Request::update_where(
                "T",
                record! { "Visits" => 0 },
                Filter::new().equals("City", "Berlin"),
            );

            b.iter(|| black_box(fx.conn.exec(&request).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_insert_autocommit,
    bench_insert_transaction,
    bench_update
);
criterion_main!(benches);
