//! Criterion micro-benchmarks for perception encoding and grid queries.

use std::hint::black_box;

use brood_core::{Heading, Position};
use brood_obs::{AgentView, DangerMode, PerceptionConfig, PerceptionEncoder};
use brood_space::{EdgeBehavior, GridWorld};
use criterion::{criterion_group, criterion_main, Criterion};

/// A 64x64 grid with food on every 37th cell.
fn world() -> GridWorld {
    let mut world = GridWorld::new(64, 64, EdgeBehavior::Absorb).unwrap();
    for i in (0..world.cell_count()).step_by(37) {
        let pos = world.position(i);
        world.place_food(pos).unwrap();
    }
    world
}

fn views(world: &GridWorld) -> Vec<AgentView> {
    (0..1000)
        .map(|i| AgentView {
            head: world.position((i * 7919) % world.cell_count()),
            heading: Heading::ALL[i % 4],
            length: 1 + i % 20,
        })
        .collect()
}

/// Benchmark: encode 1K agents with the default encoding.
fn bench_encode_default_1k(c: &mut Criterion) {
    let world = world();
    let views = views(&world);
    let encoder = PerceptionEncoder::new(PerceptionConfig::default());

    c.bench_function("encode_default_1k", |b| {
        b.iter(|| {
            for v in &views {
                black_box(encoder.encode(v, &world));
            }
        });
    });
}

/// Benchmark: encode 1K agents with every component enabled.
fn bench_encode_full_1k(c: &mut Criterion) {
    let world = world();
    let views = views(&world);
    let encoder = PerceptionEncoder::new(
        PerceptionConfig::default()
            .with_danger(DangerMode::Neighbourhood8)
            .with_length_buckets(4)
            .with_distance_buckets(4)
            .with_heading(true),
    );

    c.bench_function("encode_full_1k", |b| {
        b.iter(|| {
            for v in &views {
                black_box(encoder.encode(v, &world));
            }
        });
    });
}

/// Benchmark: nearest-food lookup from 1K positions.
fn bench_nearest_food_1k(c: &mut Criterion) {
    let world = world();
    let origins: Vec<Position> = (0..1000)
        .map(|i| world.position((i * 104_729) % world.cell_count()))
        .collect();

    c.bench_function("nearest_food_1k", |b| {
        b.iter(|| {
            for &o in &origins {
                black_box(world.nearest_food(o));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_encode_default_1k,
    bench_encode_full_1k,
    bench_nearest_food_1k
);
criterion_main!(benches);
