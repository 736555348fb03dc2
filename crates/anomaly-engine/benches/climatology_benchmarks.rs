//! Benchmarks for climatology construction and anomaly alignment.
//!
//! Run with: cargo bench --package anomaly-engine
//! Or: cargo bench --package anomaly-engine --bench climatology_benchmarks

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use anomaly_engine::{AnomalyAligner, ClimatologyBuilder};
use test_utils::{create_lst_series, daily_dates, fixtures, grid_from_spec};

fn grid(size: usize) -> terra_common::SpatialGrid {
    grid_from_spec(&fixtures::grid::GridSpec {
        width: size,
        height: size,
        step: 0.05,
        ..fixtures::grid::DENSE_1000
    })
}

fn bench_climatology(c: &mut Criterion) {
    let mut group = c.benchmark_group("climatology_build");
    group.sample_size(10);

    let (start, end) = fixtures::period::SHORT_BASELINE;
    let dates = daily_dates(start..=end, None);
    let years: BTreeSet<i32> = (start..=end).collect();

    for size in [16usize, 64, 128] {
        let series = create_lst_series(&grid(size), &dates, 42);
        group.throughput(Throughput::Elements(series.values().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size * size), &series, |b, series| {
            let builder = ClimatologyBuilder::new();
            b.iter(|| builder.build(black_box(series), black_box(&years)))
        });
    }

    group.finish();
}

fn bench_alignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("anomaly_align");

    let (start, end) = fixtures::period::SHORT_BASELINE;
    let years: BTreeSet<i32> = (start..=end).collect();

    for size in [16usize, 64, 128] {
        let grid = grid(size);
        let baseline = create_lst_series(&grid, &daily_dates(start..=end, None), 42);
        let clim = ClimatologyBuilder::new()
            .build(&baseline, &years)
            .expect("baseline covers its years");
        let event = create_lst_series(
            &grid,
            &daily_dates(
                fixtures::period::EVENT_YEAR..=fixtures::period::EVENT_YEAR,
                Some(&fixtures::period::SUMMER_MONTHS),
            ),
            43,
        );

        group.throughput(Throughput::Elements(event.values().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size * size), &event, |b, event| {
            let aligner = AnomalyAligner::new();
            b.iter(|| aligner.align(black_box(event), black_box(&clim)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_climatology, bench_alignment);
criterion_main!(benches);
