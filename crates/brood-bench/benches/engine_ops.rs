//! Criterion benchmarks for whole ticks.

use std::hint::black_box;

use brood_bench::{approximate_profile, reference_profile, stress_profile};
use brood_engine::{SimConfig, Simulation};
use criterion::{criterion_group, criterion_main, Criterion};

/// Warm a world up past its first deaths so ticks are representative.
fn warmed(config: SimConfig) -> Simulation {
    let mut sim = Simulation::new(config).unwrap();
    for _ in 0..200 {
        sim.tick().unwrap();
    }
    sim
}

/// Benchmark: one reference tick, decisions inline.
fn bench_tick_reference_inline(c: &mut Criterion) {
    let mut sim = warmed(reference_profile(42));
    c.bench_function("tick_reference_inline", |b| {
        b.iter(|| black_box(sim.tick().unwrap()));
    });
}

/// Benchmark: one reference tick, decisions on four workers.
fn bench_tick_reference_pool(c: &mut Criterion) {
    let mut sim = warmed(reference_profile(42).with_workers(4));
    c.bench_function("tick_reference_pool4", |b| {
        b.iter(|| black_box(sim.tick().unwrap()));
    });
}

/// Benchmark: one stress tick (256 agents) on four workers.
fn bench_tick_stress_pool(c: &mut Criterion) {
    let mut sim = warmed(stress_profile(42).with_workers(4));
    c.bench_function("tick_stress_pool4", |b| {
        b.iter(|| black_box(sim.tick().unwrap()));
    });
}

/// Benchmark: one reference tick with network policies.
fn bench_tick_approximate(c: &mut Criterion) {
    let mut sim = warmed(approximate_profile(42));
    c.bench_function("tick_approximate_inline", |b| {
        b.iter(|| black_box(sim.tick().unwrap()));
    });
}

/// Benchmark: snapshot of a reference world.
fn bench_snapshot(c: &mut Criterion) {
    let sim = warmed(reference_profile(42));
    c.bench_function("snapshot_reference", |b| {
        b.iter(|| black_box(sim.snapshot()));
    });
}

criterion_group!(
    benches,
    bench_tick_reference_inline,
    bench_tick_reference_pool,
    bench_tick_stress_pool,
    bench_tick_approximate,
    bench_snapshot
);
criterion_main!(benches);
