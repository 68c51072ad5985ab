use shiplink_core::memory::MemoryWorld;
use shiplink_core::*;

fn pos(x: i32, y: i32, z: i32) -> BlockPos {
    BlockPos::new(x, y, z)
}

fn double_chest(world: &mut MemoryWorld) {
    world.set_container(
        pos(0, 0, -1),
        ContainerState {
            facing: Direction::South,
            half: ChestHalf::Right,
        },
    );
    world.set_container(
        pos(1, 0, -1),
        ContainerState {
            facing: Direction::South,
            half: ChestHalf::Left,
        },
    );
}

#[test]
fn test_double_chest_shares_one_primary() {
    let mut world = MemoryWorld::new();
    double_chest(&mut world);
    let mut net = Network::default();

    let primary = net.resolve_primary(&world, pos(1, 0, -1)).unwrap();
    assert_eq!(primary, pos(0, 0, -1));
    assert_eq!(net.storage_members(primary), vec![pos(0, 0, -1), pos(1, 0, -1)]);
    assert_eq!(net.storage_group_of(pos(0, 0, -1)), Some(primary));
}

#[test]
fn test_primary_does_not_depend_on_discovery_side() {
    let mut world = MemoryWorld::new();
    double_chest(&mut world);

    // Reach the right half from a node east of the left half, and the other
    // way around.
    let mut from_east = Network::default();
    world.set_node(pos(2, 0, -1), Direction::Up);
    let east = from_east
        .on_node_placed(&world, pos(2, 0, -1), None, Direction::Up)
        .unwrap()
        .group();

    let mut from_west = Network::default();
    world.set_node(pos(-1, 0, -1), Direction::Up);
    let west = from_west
        .on_node_placed(&world, pos(-1, 0, -1), None, Direction::Up)
        .unwrap()
        .group();

    assert_eq!(from_east.linked_containers(east), from_west.linked_containers(west));
    assert_eq!(from_east.storage_group_of(pos(1, 0, -1)), Some(pos(0, 0, -1)));
    assert_eq!(from_west.storage_group_of(pos(1, 0, -1)), Some(pos(0, 0, -1)));
}

#[test]
fn test_container_appearing_next_to_groups_links_them() {
    let mut world = MemoryWorld::new();
    let mut net = Network::default();
    world.set_node(pos(0, 0, 0), Direction::East);
    world.set_node(pos(0, 2, 0), Direction::Down);
    let a = net
        .on_node_placed(&world, pos(0, 0, 0), None, Direction::East)
        .unwrap()
        .group();
    let b = net
        .on_node_placed(&world, pos(0, 2, 0), None, Direction::Down)
        .unwrap()
        .group();
    assert_eq!(net.linked_container_count(a), 0);

    // Above `a` (a side face) and below `b` (b's facing).
    world.set_container(pos(0, 1, 0), ContainerState::single(Direction::North));
    let linked = net.on_container_appeared(&world, pos(0, 1, 0));
    assert_eq!(linked, vec![a]);
    assert_eq!(net.linked_container_count(a), 1);
    assert_eq!(net.linked_container_count(b), 0);
}

#[test]
fn test_breaking_both_halves_dissolves_storage() {
    let mut world = MemoryWorld::new();
    double_chest(&mut world);
    world.set_node(pos(0, 1, -1), Direction::Up);
    let mut net = Network::default();
    let id = net
        .on_node_placed(&world, pos(0, 1, -1), None, Direction::Up)
        .unwrap()
        .group();
    assert_eq!(net.linked_containers(id).len(), 2);

    world.remove_container(pos(1, 0, -1));
    assert!(matches!(
        net.on_container_disappeared(&world, pos(1, 0, -1)),
        ContainerRemoval::Shrunk { links_dropped: 0, .. }
    ));
    world.remove_container(pos(0, 0, -1));
    let removal = net.on_container_disappeared(&world, pos(0, 0, -1));
    assert_eq!(
        removal,
        ContainerRemoval::Dissolved {
            primary: pos(0, 0, -1),
            unlinked: vec![id]
        }
    );
    assert_eq!(net.linked_container_count(id), 0);
    assert_eq!(net.on_container_removed(pos(0, 0, -1)), ContainerRemoval::NotTracked);
}

#[test]
fn test_disappearance_ignored_while_container_present() {
    let mut world = MemoryWorld::new();
    world.set_container(pos(0, 0, 0), ContainerState::single(Direction::East));
    let mut net = Network::default();
    net.resolve_primary(&world, pos(0, 0, 0));
    assert_eq!(
        net.on_container_disappeared(&world, pos(0, 0, 0)),
        ContainerRemoval::NotTracked
    );
    assert_eq!(net.tracked_containers(), vec![pos(0, 0, 0)]);
}

#[test]
fn test_link_changes_mark_groups_dirty() {
    let mut world = MemoryWorld::new();
    world.set_node(pos(0, 0, 0), Direction::Up);
    let mut net = Network::default();
    let id = net
        .on_node_placed(&world, pos(0, 0, 0), None, Direction::Up)
        .unwrap()
        .group();
    net.take_dirty_groups();
    net.clear_dirty();

    world.set_container(pos(1, 0, 0), ContainerState::single(Direction::North));
    net.on_container_appeared(&world, pos(1, 0, 0));
    assert!(net.is_dirty());
    assert!(net.take_dirty_groups().contains(&id));
}
