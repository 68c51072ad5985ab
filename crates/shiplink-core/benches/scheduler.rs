use criterion::{Criterion, criterion_group, criterion_main};
use glam::{DQuat, DVec3};
use shiplink_core::memory::MemoryWorld;
use shiplink_core::*;
use std::hint::black_box;

const SHIP: StructureId = StructureId(1);

/// `lanes` grounded exporters along z, each facing a ship importer.
fn build_dock(lanes: i32) -> (MemoryWorld, Network, StructureSet) {
    let mut world = MemoryWorld::new();
    let mut net = Network::default();

    for i in 0..lanes {
        let z = i * 3;
        let dock_node = BlockPos::new(4, 0, z);
        let ship_node = BlockPos::new(0, 0, z);
        world.set_container(dock_node.offset(Direction::Up), ContainerState::single(Direction::North));
        world.set_container(ship_node.offset(Direction::Up), ContainerState::single(Direction::North));
        world.fill(dock_node.offset(Direction::Up), ItemBatch::new("stone", 1000));

        let exporter = net
            .on_node_placed(&world, dock_node, None, Direction::East)
            .unwrap()
            .group();
        net.toggle_mode(exporter).unwrap();
        net.on_node_placed(&world, ship_node, Some(SHIP), Direction::West)
            .unwrap();
    }

    let mut structures = StructureSet::new();
    let transform = StructureTransform::new(DVec3::new(7.0, 0.0, 0.0), DQuat::IDENTITY);
    structures.upsert(Structure {
        id: SHIP,
        transform,
        bounds: transform.aabb(&Aabb::new(DVec3::ZERO, DVec3::new(2.0, 2.0, f64::from(lanes * 3)))),
    });
    (world, net, structures)
}

fn bench_snapshots_100(c: &mut Criterion) {
    let (_, net, structures) = build_dock(50);

    c.bench_function("snapshots_100_groups", |b| {
        b.iter(|| black_box(&net).snapshots(black_box(&structures)))
    });
}

fn bench_transfer_run_100(c: &mut Criterion) {
    let (mut world, mut net, structures) = build_dock(50);

    c.bench_function("transfer_run_100_groups", |b| {
        b.iter(|| net.run_transfers(black_box(&mut world), black_box(&structures)))
    });
}

fn bench_transfer_run_400(c: &mut Criterion) {
    let (mut world, mut net, structures) = build_dock(200);

    c.bench_function("transfer_run_400_groups", |b| {
        b.iter(|| net.run_transfers(black_box(&mut world), black_box(&structures)))
    });
}

fn bench_save_serialization(c: &mut Criterion) {
    let (_, net, _) = build_dock(200);

    c.bench_function("serialize_save_400_groups", |b| {
        b.iter(|| schema::to_json(black_box(&net.to_saved())).unwrap())
    });
}

criterion_group!(
    benches,
    bench_snapshots_100,
    bench_transfer_run_100,
    bench_transfer_run_400,
    bench_save_serialization,
);
criterion_main!(benches);
