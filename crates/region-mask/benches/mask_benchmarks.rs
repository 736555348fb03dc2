//! Benchmarks for region mask construction.
//!
//! Run with: cargo bench --package region-mask
//! Or: cargo bench --package region-mask --bench mask_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use region_mask::{MaskBuilder, MaskStrategy, RegionPolygon};
use terra_common::SpatialGrid;
use test_utils::fixtures;

/// Irregular ring of `n` vertices around a centre, roughly lake shaped.
fn lake(cx: f64, cy: f64, n: usize) -> RegionPolygon {
    let vertices = (0..n)
        .map(|i| {
            let angle = i as f64 / n as f64 * std::f64::consts::TAU;
            let radius = 2.0 + 0.4 * (5.0 * angle).sin() + 0.2 * (13.0 * angle).cos();
            (cx + radius * angle.cos(), cy + 0.7 * radius * angle.sin())
        })
        .collect();
    RegionPolygon::new(vertices, vec![]).expect("lake ring is simple")
}

fn grid(width: usize, height: usize) -> SpatialGrid {
    let spec = fixtures::grid::GridSpec {
        width,
        height,
        // same 10 degree extent at every resolution
        step: 10.0 / width as f64,
        ..fixtures::grid::DENSE_1000
    };
    SpatialGrid::geographic(spec.lats(), spec.lons()).expect("benchmark grid is valid")
}

// =============================================================================
// STRATEGY COMPARISON
// =============================================================================

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("mask_build");
    group.sample_size(10);

    let polygons = vec![lake(19.0, 50.0, 200), lake(21.0, 47.5, 120)];

    for &(width, height) in &[(100usize, 100usize), (320, 320), (1000, 1000)] {
        let grid = grid(width, height);
        group.throughput(Throughput::Elements((width * height) as u64));

        for strategy in [MaskStrategy::Indexed, MaskStrategy::Naive] {
            // the naive path is too slow to be worth sampling at a million points
            if strategy == MaskStrategy::Naive && width * height > 200_000 {
                continue;
            }
            group.bench_with_input(
                BenchmarkId::new(strategy.to_string(), width * height),
                &grid,
                |b, grid| {
                    let builder = MaskBuilder::new(strategy);
                    b.iter(|| builder.build(black_box(&polygons), black_box(grid)))
                },
            );
        }
    }

    group.finish();
}

// =============================================================================
// POLYGON COMPLEXITY
// =============================================================================

fn bench_vertex_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("mask_vertices");
    group.sample_size(10);

    let grid = grid(320, 320);
    for vertices in [16usize, 256, 2048, 4096] {
        let polygons = vec![lake(19.0, 50.0, vertices)];
        for strategy in [MaskStrategy::Indexed, MaskStrategy::Naive] {
            // naive cost grows with every edge; stop before it dominates the run
            if strategy == MaskStrategy::Naive && vertices > 256 {
                continue;
            }
            group.bench_with_input(BenchmarkId::new(strategy.to_string(), vertices), &polygons, |b, polygons| {
                let builder = MaskBuilder::new(strategy);
                b.iter(|| builder.build(black_box(polygons), black_box(&grid)))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_strategies, bench_vertex_count);
criterion_main!(benches);
