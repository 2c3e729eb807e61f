//! # Archetype Storage Benchmark
//!
//! Measures the two hot paths of the storage manager:
//! 1. Migration when a component is attached or detached
//! 2. Column iteration across every archetype holding a type
//!
//! Run with: `cargo bench --package shadow_entity --bench archetype_benchmark`

#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shadow_entity::{Node, NodeKind, StorageManager, Uuid};

const ENTITY_COUNT: usize = 100_000;

struct Actor;
impl Node for Actor {
    const KIND: NodeKind = NodeKind::Entity;
}

#[derive(Clone, Copy)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}
impl Node for Position {
    const KIND: NodeKind = NodeKind::Component;
}

#[derive(Clone, Copy)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}
impl Node for Velocity {
    const KIND: NodeKind = NodeKind::Component;
}

fn spawn_actors(storage: &mut StorageManager, count: usize) -> Vec<Uuid> {
    let mut actors = Vec::with_capacity(count);
    for _ in 0..count {
        let Ok(handle) = storage.add(Actor) else { break };
        if let Ok(uuid) = storage.uuid_of(handle) {
            actors.push(uuid);
        }
    }
    actors
}

// =============================================================================
// MIGRATION
// =============================================================================

fn bench_migration(c: &mut Criterion) {
    let mut storage = StorageManager::new();
    let actors = spawn_actors(&mut storage, 10_000);

    c.bench_function("attach_detach_10k", |b| {
        b.iter(|| {
            for &actor in &actors {
                let _ = storage.add_component(
                    actor,
                    Velocity {
                        x: 1.0,
                        y: 0.0,
                        z: 0.0,
                    },
                );
            }
            for &actor in &actors {
                black_box(storage.remove_component::<Velocity>(actor).ok());
            }
        });
    });
}

// =============================================================================
// ITERATION
// =============================================================================

fn bench_query(c: &mut Criterion) {
    let mut storage = StorageManager::new();
    let actors = spawn_actors(&mut storage, ENTITY_COUNT);

    for (i, &actor) in actors.iter().enumerate() {
        let _ = storage.add_component(
            actor,
            Position {
                x: i as f32,
                y: 0.0,
                z: 0.0,
            },
        );
        // Half the actors move, splitting positions over two archetypes.
        if i % 2 == 0 {
            let _ = storage.add_component(
                actor,
                Velocity {
                    x: 0.1,
                    y: 0.2,
                    z: 0.3,
                },
            );
        }
    }

    c.bench_function("query_positions_100k", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for (_, position) in storage.query::<Position>() {
                sum += position.x + position.y + position.z;
            }
            black_box(sum)
        });
    });

    c.bench_function("query_mut_positions_100k", |b| {
        b.iter(|| {
            for (_, position) in storage.query_mut::<Position>() {
                position.x += 0.016;
            }
        });
    });

    c.bench_function("velocity_lookup_by_uuid_100k", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for &actor in &actors {
                if let Some(velocity) = storage.get_component::<Velocity>(actor) {
                    sum += velocity.x + velocity.y + velocity.z;
                }
            }
            black_box(sum)
        });
    });
}

criterion_group!(benches, bench_migration, bench_query);
criterion_main!(benches);
