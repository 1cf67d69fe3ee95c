//! End-to-end tests driving `HashJoinOperator` over in-memory batches.

use arrow::array::{Array, AsArray, Int32Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Int32Type, Schema, SchemaRef};
use std::sync::Arc;
use vjx_core::VjxResult;
use vjx_core::exec::{BatchSource, PhysicalOperator};
use vjx_core::join::{HashJoinOperator, JoinConfig, JoinType};
use vjx_core::memory::MemoryPool;

/// Schema with a join key and a row tag, used for both sides.
fn tagged_schema(tag: &str) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("k", DataType::Int32, true),
        Field::new(tag, DataType::Int32, false),
    ]))
}

fn tagged_batch(schema: &SchemaRef, keys: Vec<Option<i32>>, tags: Vec<i32>) -> RecordBatch {
    RecordBatch::try_new(
        Arc::clone(schema),
        vec![
            Arc::new(Int32Array::from(keys)),
            Arc::new(Int32Array::from(tags)),
        ],
    )
    .unwrap()
}

fn join_operator(
    build: Vec<RecordBatch>,
    probe: Vec<RecordBatch>,
    join_type: JoinType,
    config: JoinConfig,
) -> HashJoinOperator {
    HashJoinOperator::try_new(
        Box::new(BatchSource::from_batches(build)),
        Box::new(BatchSource::from_batches(probe)),
        vec![(0, 0)],
        join_type,
        config,
        MemoryPool::unbounded(),
    )
    .unwrap()
}

/// Collect the output as (build_tag, probe_tag) pairs; `None` marks a
/// null-projected side. Output columns: [bk, btag, pk, ptag].
fn collect_pairs(op: &mut HashJoinOperator) -> VjxResult<Vec<(Option<i32>, Option<i32>)>> {
    let mut pairs = Vec::new();
    while let Some(batch) = op.next()? {
        let btag = batch.column(1).as_primitive::<Int32Type>();
        let ptag = batch.column(3).as_primitive::<Int32Type>();
        for row in 0..batch.num_rows() {
            let b = (!btag.is_null(row)).then(|| btag.value(row));
            let p = (!ptag.is_null(row)).then(|| ptag.value(row));
            pairs.push((b, p));
        }
    }
    Ok(pairs)
}

#[test]
fn inner_join_round_trip_multiset() {
    let bs = tagged_schema("btag");
    let ps = tagged_schema("ptag");
    let build_keys = [1, 2, 2, 3, 3, 3];
    let probe_keys = [2, 3, 4, 2];

    let build = tagged_batch(
        &bs,
        build_keys.iter().map(|&k| Some(k)).collect(),
        (0..build_keys.len() as i32).collect(),
    );
    let probe = tagged_batch(
        &ps,
        probe_keys.iter().map(|&k| Some(k)).collect(),
        (100..100 + probe_keys.len() as i32).collect(),
    );

    let mut expected = Vec::new();
    for (p, &pk) in probe_keys.iter().enumerate() {
        for (b, &bk) in build_keys.iter().enumerate() {
            if pk == bk {
                expected.push((Some(b as i32), Some(100 + p as i32)));
            }
        }
    }
    expected.sort();

    let mut op = join_operator(vec![build], vec![probe], JoinType::Inner, JoinConfig::default());
    let mut pairs = collect_pairs(&mut op).unwrap();
    pairs.sort();
    assert_eq!(pairs, expected);
}

#[test]
fn left_join_projects_every_probe_row() {
    let bs = tagged_schema("btag");
    let ps = tagged_schema("ptag");
    let build = tagged_batch(&bs, vec![Some(1), Some(2)], vec![0, 1]);
    let probe = tagged_batch(&ps, vec![Some(2), Some(9), Some(2)], vec![100, 101, 102]);

    let mut op = join_operator(vec![build], vec![probe], JoinType::Left, JoinConfig::default());
    let mut pairs = collect_pairs(&mut op).unwrap();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            (None, Some(101)),
            (Some(1), Some(100)),
            (Some(1), Some(102)),
        ]
    );
}

#[test]
fn right_join_drains_unmatched_build_rows_once() {
    let bs = tagged_schema("btag");
    let ps = tagged_schema("ptag");
    let build = tagged_batch(&bs, vec![Some(1), Some(2), Some(3)], vec![0, 1, 2]);
    let probe = tagged_batch(&ps, vec![Some(2)], vec![100]);

    let mut op = join_operator(vec![build], vec![probe], JoinType::Right, JoinConfig::default());
    let mut pairs = collect_pairs(&mut op).unwrap();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![(Some(0), None), (Some(1), Some(100)), (Some(2), None)]
    );
}

#[test]
fn full_join_satisfies_both_completeness_sides() {
    let bs = tagged_schema("btag");
    let ps = tagged_schema("ptag");
    let build = tagged_batch(&bs, vec![Some(1), Some(2)], vec![0, 1]);
    let probe = tagged_batch(&ps, vec![Some(2), Some(9)], vec![100, 101]);

    let mut op = join_operator(vec![build], vec![probe], JoinType::Full, JoinConfig::default());
    let mut pairs = collect_pairs(&mut op).unwrap();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![(None, Some(101)), (Some(0), None), (Some(1), Some(100))]
    );
}

#[test]
fn empty_build_side_left_join() {
    let bs = tagged_schema("btag");
    let ps = tagged_schema("ptag");
    let probe = tagged_batch(&ps, vec![Some(1), Some(2)], vec![100, 101]);

    let mut op = join_operator(
        vec![RecordBatch::new_empty(bs)],
        vec![probe],
        JoinType::Left,
        JoinConfig::default(),
    );
    let mut pairs = collect_pairs(&mut op).unwrap();
    pairs.sort();
    assert_eq!(pairs, vec![(None, Some(100)), (None, Some(101))]);
}

#[test]
fn empty_probe_side_right_join() {
    let bs = tagged_schema("btag");
    let ps = tagged_schema("ptag");
    let build = tagged_batch(&bs, vec![Some(1)], vec![0]);

    let mut op = join_operator(
        vec![build],
        vec![RecordBatch::new_empty(ps)],
        JoinType::Right,
        JoinConfig::default(),
    );
    let pairs = collect_pairs(&mut op).unwrap();
    assert_eq!(pairs, vec![(Some(0), None)]);
}

#[test]
fn null_keys_never_match_by_default() {
    let bs = tagged_schema("btag");
    let ps = tagged_schema("ptag");
    let build = tagged_batch(&bs, vec![None, Some(1)], vec![0, 1]);
    let probe = tagged_batch(&ps, vec![None, Some(1)], vec![100, 101]);

    let mut op = join_operator(
        vec![build],
        vec![probe],
        JoinType::Inner,
        JoinConfig::default(),
    );
    let pairs = collect_pairs(&mut op).unwrap();
    assert_eq!(pairs, vec![(Some(1), Some(101))]);
}

#[test]
fn null_keys_match_when_configured() {
    let bs = tagged_schema("btag");
    let ps = tagged_schema("ptag");
    let build = tagged_batch(&bs, vec![None, Some(1)], vec![0, 1]);
    let probe = tagged_batch(&ps, vec![None, Some(1)], vec![100, 101]);

    let config = JoinConfig {
        null_equals_null: true,
        ..JoinConfig::default()
    };
    let mut op = join_operator(vec![build], vec![probe], JoinType::Inner, config);
    let mut pairs = collect_pairs(&mut op).unwrap();
    pairs.sort();
    assert_eq!(pairs, vec![(Some(0), Some(100)), (Some(1), Some(101))]);
}

#[test]
fn small_output_batches_cover_the_same_rows() {
    let bs = tagged_schema("btag");
    let ps = tagged_schema("ptag");
    // Key 1 fans out ×4 over 8 probe rows: 32 output rows at capacity 5.
    let build = tagged_batch(&bs, vec![Some(1); 4], vec![0, 1, 2, 3]);
    let probe = tagged_batch(
        &ps,
        vec![Some(1); 8],
        (100..108).collect::<Vec<i32>>(),
    );

    let config = JoinConfig {
        output_batch_size: 5,
        ..JoinConfig::default()
    };
    let mut op = join_operator(vec![build], vec![probe], JoinType::Inner, config);
    let mut rows = 0;
    let mut batches = 0;
    while let Some(batch) = op.next().unwrap() {
        assert!(batch.num_rows() <= 5);
        rows += batch.num_rows();
        batches += 1;
    }
    assert_eq!(rows, 32);
    assert!(batches >= 7);
}

#[test]
fn reset_allows_reexecution() {
    let bs = tagged_schema("btag");
    let ps = tagged_schema("ptag");
    let build = tagged_batch(&bs, vec![Some(1), Some(2)], vec![0, 1]);
    let probe = tagged_batch(&ps, vec![Some(1), Some(2)], vec![100, 101]);

    let mut op = join_operator(
        vec![build],
        vec![probe],
        JoinType::Inner,
        JoinConfig::default(),
    );
    let first = collect_pairs(&mut op).unwrap();
    op.reset().unwrap();
    let second = collect_pairs(&mut op).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[test]
fn probe_metrics_accumulate() {
    let bs = tagged_schema("btag");
    let ps = tagged_schema("ptag");
    let build = tagged_batch(&bs, vec![Some(1)], vec![0]);
    let probe = tagged_batch(&ps, vec![Some(1)], vec![100]);

    let mut op = join_operator(
        vec![build],
        vec![probe],
        JoinType::Inner,
        JoinConfig::default(),
    );
    assert!(op.probe_metrics().is_none()); // engine not built yet
    while op.next().unwrap().is_some() {}
    let metrics = op.probe_metrics().unwrap();
    assert!(metrics.probe_find_ns > 0);
}
