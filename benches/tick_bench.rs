use bevy::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use nightfall_core::store::snapshot::WorldSnapshot;
use nightfall_core::trajectory::{integrate, PatternParams, PatternState, TrajectoryKind};
use nightfall_core::{Archetype, CombatConfig, CombatSim};

/// Hero against `packs` wolf packs (one alpha, four grunts each)
fn encounter(packs: usize) -> CombatSim {
    let mut sim = CombatSim::new(CombatConfig::default()).unwrap();
    let hero = sim.spawn(Archetype::Hero, Vec2::new(640.0, 360.0)).unwrap();
    for p in 0..packs {
        let center = Vec2::new(100.0 + p as f32 * 40.0, 200.0);
        let mut members = vec![sim.spawn(Archetype::Alpha, center).unwrap()];
        for i in 0..4 {
            let offset = Vec2::from_angle(i as f32 * 1.5) * 3.0;
            members.push(sim.spawn(Archetype::Basic, center + offset).unwrap());
        }
        for m in members {
            sim.set_target(m, Some(hero));
        }
    }
    sim
}

fn bench_tick(c: &mut Criterion) {
    c.bench_function("tick_5_packs", |b| {
        b.iter_batched(
            || encounter(5),
            |mut sim| {
                for _ in 0..10 {
                    black_box(sim.tick(0.1));
                }
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("tick_40_packs", |b| {
        b.iter_batched(
            || encounter(40),
            |mut sim| {
                black_box(sim.tick(0.1));
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_trajectories(c: &mut Criterion) {
    for kind in TrajectoryKind::ALL {
        c.bench_function(&format!("integrate_{:?}", kind).to_lowercase(), |b| {
            b.iter(|| {
                let mut state = PatternState::new(30.0, PatternParams::default());
                let mut position = Vec2::new(100.0, 100.0);
                for _ in 0..100 {
                    let (next, _) = integrate(
                        kind,
                        &mut state,
                        position,
                        black_box(Vec2::new(400.0, 300.0)),
                        0.016,
                    );
                    position = next;
                }
                position
            })
        });
    }
}

fn bench_snapshot(c: &mut Criterion) {
    let mut sim = encounter(10);
    sim.tick(0.1);

    c.bench_function("snapshot_capture", |b| {
        b.iter(|| WorldSnapshot::capture(black_box(sim.world()), 1))
    });

    let snapshot = sim.snapshot();
    c.bench_function("snapshot_digest", |b| b.iter(|| black_box(&snapshot).digest()));
}

criterion_group!(benches, bench_tick, bench_trajectories, bench_snapshot);
criterion_main!(benches);
