use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use qsweep::{Axis, Backend, Evaluator, ExecutionSettings, GridPoint, ParameterGrid, PoolManager};
use qsweep::SweepDispatcher;
use std::hint::black_box;
use std::time::Duration;
use system_profile::SystemProfile;

/// A few microseconds of floating-point work per point
fn synthetic_spectrum(point: &GridPoint, levels: &usize) -> anyhow::Result<Vec<f64>> {
    let flux = point.values()[0];
    let ng = point.values()[1];
    Ok((0..*levels)
        .map(|n| {
            (0..200).fold(0.0, |acc, k| {
                acc + ((n as f64 + flux) * k as f64).sin() * (ng * k as f64).cos()
            })
        })
        .collect())
}

fn grid(points_per_axis: usize) -> ParameterGrid {
    ParameterGrid::product(vec![
        Axis::linspace("flux", 0.0, 0.5, points_per_axis),
        Axis::linspace("ng", -0.5, 0.5, points_per_axis),
    ])
    .expect("valid grid")
}

fn bench_backends(c: &mut Criterion) {
    let pools = PoolManager::new();
    let evaluator = Evaluator::function("synthetic_spectrum", synthetic_spectrum);
    let workers = SystemProfile::cpu_count().clamp(2, 8);

    let mut group = c.benchmark_group("sweep_backends");
    group.measurement_time(Duration::from_secs(10));

    for size in [8, 24] {
        let grid = grid(size);

        group.bench_with_input(BenchmarkId::new("serial", size), &grid, |b, grid| {
            let dispatcher = SweepDispatcher::new(&ExecutionSettings::default(), &pools);
            b.iter(|| black_box(dispatcher.run(grid, &evaluator, 5, Some(1)).expect("sweep")));
        });

        for backend in Backend::ALL {
            let mut settings = ExecutionSettings::new(workers, backend).expect("valid settings");
            settings.set_enforce_core_limit(false);
            group.bench_with_input(BenchmarkId::new(backend.id(), size), &grid, |b, grid| {
                let dispatcher = SweepDispatcher::new(&settings, &pools);
                b.iter(|| black_box(dispatcher.run(grid, &evaluator, 5, None).expect("sweep")));
            });
        }
    }

    group.finish();
    pools.teardown();
}

fn bench_chunk_sizes(c: &mut Criterion) {
    let pools = PoolManager::new();
    let evaluator = Evaluator::function("synthetic_spectrum", synthetic_spectrum);
    let grid = grid(32);

    let mut group = c.benchmark_group("chunk_size");
    for chunk_size in [1, 16, 0] {
        let mut settings =
            ExecutionSettings::new(SystemProfile::cpu_count().clamp(2, 8), Backend::Native)
                .expect("valid settings");
        settings.set_chunk_size(chunk_size);
        settings.set_enforce_core_limit(false);

        group.bench_with_input(BenchmarkId::from_parameter(chunk_size), &grid, |b, grid| {
            let dispatcher = SweepDispatcher::new(&settings, &pools);
            b.iter(|| black_box(dispatcher.run(grid, &evaluator, 3, None).expect("sweep")));
        });
    }
    group.finish();
    pools.teardown();
}

fn setup_criterion() -> Criterion {
    Criterion::default().sample_size(20).warm_up_time(Duration::from_secs(2))
}

criterion_group!(
    name = benches;
    config = setup_criterion();
    targets = bench_backends, bench_chunk_sizes
);
criterion_main!(benches);
