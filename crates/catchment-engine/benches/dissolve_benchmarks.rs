//! Benchmarks for dissolve, geometry decoding and viewport queries.
//!
//! Run with: cargo bench --package catchment-engine

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use catchment_engine::{dissolve, BoundingBox, CancellationToken, SpatialIndex};
use gpkg_geometry::{decode, encode_gpkg, CatchmentGeometry, EncodeOptions};
use test_utils::square_grid;

fn grid_lookup(n: usize) -> BTreeMap<i64, CatchmentGeometry> {
    square_grid(n, 0.01).into_iter().collect()
}

// =============================================================================
// DISSOLVE BENCHMARKS
// =============================================================================

fn bench_dissolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("dissolve");
    group.sample_size(20);

    for n in [4usize, 10, 20] {
        let lookup = grid_lookup(n);
        let ids: Vec<i64> = lookup.keys().copied().collect();
        let token = CancellationToken::new();
        group.bench_with_input(BenchmarkId::new("adjacent_grid", n * n), &ids, |b, ids| {
            b.iter(|| dissolve(black_box(&lookup), ids.iter().copied(), &token))
        });
    }

    group.finish();
}

// =============================================================================
// DECODE BENCHMARKS
// =============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    let (_, square) = square_grid(1, 1.0).remove(0);
    let blob = encode_gpkg(&square, EncodeOptions::default());
    group.bench_function("square", |b| b.iter(|| decode(black_box(&blob))));

    let parts = square_grid(16, 1.0)
        .into_iter()
        .flat_map(|(_, g)| g.polygons().to_vec())
        .collect();
    let multi = CatchmentGeometry::MultiPolygon(geo::MultiPolygon::new(parts));
    let blob = encode_gpkg(&multi, EncodeOptions::default());
    group.bench_function("multipolygon_256_parts", |b| {
        b.iter(|| decode(black_box(&blob)))
    });

    group.finish();
}

// =============================================================================
// VIEWPORT BENCHMARKS
// =============================================================================

fn bench_viewport(c: &mut Criterion) {
    let mut group = c.benchmark_group("viewport");

    let entries: Vec<(i64, BoundingBox)> = square_grid(200, 0.01)
        .into_iter()
        .filter_map(|(id, g)| g.bbox().map(|b| (id, b)))
        .collect();
    let index = SpatialIndex::build(entries);
    let token = CancellationToken::new();

    let zoomed_in = BoundingBox::new(0.5, 0.5, 0.6, 0.6);
    group.bench_function("zoomed_in", |b| {
        b.iter(|| index.query_viewport(black_box(&zoomed_in), 2000, &token))
    });

    let zoomed_out = BoundingBox::new(-10.0, -10.0, 10.0, 10.0);
    group.bench_function("zoomed_out_capped", |b| {
        b.iter(|| index.query_viewport(black_box(&zoomed_out), 2000, &token))
    });

    group.finish();
}

criterion_group!(benches, bench_dissolve, bench_decode, bench_viewport);
criterion_main!(benches);
