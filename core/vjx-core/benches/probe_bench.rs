//! Probe-phase benchmarks: lookup + chain walk + copy throughput.

use arrow::array::{Int32Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use vjx_core::join::{BuildSideBuilder, JoinConfig, JoinType, ProbeEngine};
use vjx_core::memory::MemoryPool;

fn int_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![Field::new("k", DataType::Int32, false)]))
}

fn int_batch(values: Vec<i32>) -> RecordBatch {
    RecordBatch::try_new(int_schema(), vec![Arc::new(Int32Array::from(values))]).unwrap()
}

/// Engine over `build_rows` rows with keys drawn from `key_space`.
fn setup_engine(build_rows: usize, key_space: i32, config: &JoinConfig) -> ProbeEngine {
    let mut rng = StdRng::seed_from_u64(42);
    let mut builder = BuildSideBuilder::new(int_schema(), vec![0], config);
    for chunk in (0..build_rows)
        .map(|_| rng.gen_range(0..key_space))
        .collect::<Vec<i32>>()
        .chunks(65536)
    {
        builder.push_batch(int_batch(chunk.to_vec())).unwrap();
    }
    let (side, table) = builder.finish(vec![0], false);
    ProbeEngine::try_new(
        &MemoryPool::unbounded(),
        JoinType::Inner,
        side,
        Arc::new(table),
        &int_schema(),
        &[0],
        &[0],
        config,
    )
    .unwrap()
}

fn probe_batch(rows: usize, key_space: i32, seed: u64) -> RecordBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    int_batch((0..rows).map(|_| rng.gen_range(0..key_space)).collect())
}

fn bench_inner_probe(c: &mut Criterion) {
    let mut group = c.benchmark_group("inner_probe");
    for &build_rows in &[10_000usize, 100_000] {
        let config = JoinConfig::default();
        let mut engine = setup_engine(build_rows, build_rows as i32, &config);
        let probe = probe_batch(4096, build_rows as i32, 7);

        group.bench_with_input(
            BenchmarkId::from_parameter(build_rows),
            &build_rows,
            |b, _| {
                b.iter(|| loop {
                    let ret = engine.probe_batch(black_box(&probe)).unwrap();
                    let _ = engine.take_output();
                    if ret >= 0 {
                        break;
                    }
                });
            },
        );
    }
    group.finish();
}

fn bench_high_fanout_probe(c: &mut Criterion) {
    // 64 duplicates per key: every probe row walks a long chain and the
    // output fills repeatedly.
    let config = JoinConfig::default();
    let mut engine = setup_engine(65_536, 1024, &config);
    let probe = probe_batch(1024, 1024, 11);

    c.bench_function("high_fanout_probe", |b| {
        b.iter(|| loop {
            let ret = engine.probe_batch(black_box(&probe)).unwrap();
            let _ = engine.take_output();
            if ret >= 0 {
                break;
            }
        });
    });
}

fn bench_build_side(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let keys: Vec<i32> = (0..65_536).map(|_| rng.gen_range(0..10_000)).collect();
    let config = JoinConfig::default();

    c.bench_function("build_side_65536", |b| {
        b.iter(|| {
            let mut builder = BuildSideBuilder::new(int_schema(), vec![0], &config);
            builder.push_batch(int_batch(keys.clone())).unwrap();
            black_box(builder.finish(vec![0], false))
        });
    });
}

criterion_group!(
    benches,
    bench_inner_probe,
    bench_high_fanout_probe,
    bench_build_side
);
criterion_main!(benches);
