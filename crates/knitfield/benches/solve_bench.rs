//! Criterion benches for layer construction and full solves (group "solve").
//!
//! - Layer build of the unit square and a random star at two spacings.
//! - Full coarse-to-fine solve of the built-in scenes.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use knitfield::api::*;

fn bench_layers(c: &mut Criterion) {
    let mut group = c.benchmark_group("layer");
    let square = scene("square-isoline").unwrap_or_default();
    let mut star = SketchSet::new();
    star.add(draw_star_sketch(&StarCfg::default(), SketchReplay::new(7, 0)));
    for eta in [0.05, 0.02] {
        group.bench_function(BenchmarkId::new("square", eta), |b| {
            b.iter(|| MeshLayer::build(&square, 0, &LayerCfg::new(0, eta)))
        });
        group.bench_function(BenchmarkId::new("star", eta), |b| {
            b.iter(|| MeshLayer::build(&star, 0, &LayerCfg::new(0, eta)))
        });
    }
    group.finish();
}

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");
    group.sample_size(10);
    let params = SolverParams {
        eta: 0.05,
        ..SolverParams::default()
    };
    for name in ["square-isoline", "linked-squares", "annulus"] {
        let Some(set) = scene(name) else { continue };
        group.bench_function(BenchmarkId::new("run", name), |b| {
            b.iter_batched(
                || Solver::new(set.clone(), params.clone()).unwrap(),
                |mut solver| solver.run(),
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_layers, bench_solve);
criterion_main!(benches);
