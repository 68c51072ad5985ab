//! In-memory world for tests, benchmarks and the CLI.

use crate::geometry::{BlockPos, Direction};
use crate::world::{BlockSource, ContainerState, ItemBatch, ItemStore, ItemStores};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const DEFAULT_SLOTS: usize = 27;
pub const STACK_LIMIT: u32 = 64;

/// Fixed-size slot inventory with a uniform stack limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInventory {
    slots: Vec<ItemBatch>,
    stack_limit: u32,
}

impl SlotInventory {
    pub fn new(slots: usize) -> Self {
        Self {
            slots: vec![ItemBatch::empty(); slots],
            stack_limit: STACK_LIMIT,
        }
    }

    pub fn with_stack_limit(mut self, limit: u32) -> Self {
        self.stack_limit = limit;
        self
    }

    pub fn slot(&self, slot: usize) -> Option<&ItemBatch> {
        self.slots.get(slot)
    }

    pub fn total(&self) -> u64 {
        self.slots.iter().map(|s| u64::from(s.count)).sum()
    }

    /// Count of one item kind across every slot.
    pub fn count_of(&self, item: &str) -> u64 {
        self.slots
            .iter()
            .filter(|s| s.item == item)
            .map(|s| u64::from(s.count))
            .sum()
    }

    /// Insert into the first slots that accept it; returns the leftover.
    pub fn fill(&mut self, batch: ItemBatch) -> ItemBatch {
        let mut rest = batch;
        for slot in 0..self.slots.len() {
            if rest.is_empty() {
                break;
            }
            rest = self.insert(slot, rest, false);
        }
        rest
    }
}

impl ItemStore for SlotInventory {
    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn extract(&mut self, slot: usize, max: u32, simulate: bool) -> ItemBatch {
        let Some(stack) = self.slots.get_mut(slot) else {
            return ItemBatch::empty();
        };
        let n = stack.count.min(max);
        if n == 0 {
            return ItemBatch::empty();
        }
        let taken = stack.with_count(n);
        if !simulate {
            stack.count -= n;
            if stack.count == 0 {
                *stack = ItemBatch::empty();
            }
        }
        taken
    }

    fn insert(&mut self, slot: usize, batch: ItemBatch, simulate: bool) -> ItemBatch {
        if batch.is_empty() {
            return batch;
        }
        let limit = self.stack_limit;
        let Some(stack) = self.slots.get_mut(slot) else {
            return batch;
        };
        let room = if stack.is_empty() {
            limit
        } else if stack.item == batch.item {
            limit.saturating_sub(stack.count)
        } else {
            0
        };
        let n = batch.count.min(room);
        if n == 0 {
            return batch;
        }
        if !simulate {
            if stack.is_empty() {
                *stack = batch.with_count(n);
            } else {
                stack.count += n;
            }
        }
        batch.with_count(batch.count - n)
    }
}

#[derive(Debug, Clone)]
struct ContainerCell {
    state: ContainerState,
    inventory: SlotInventory,
}

/// A sparse block grid holding transport nodes and containers.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorld {
    nodes: HashMap<BlockPos, Direction>,
    containers: HashMap<BlockPos, ContainerCell>,
    unloaded: HashSet<BlockPos>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_node(&mut self, pos: BlockPos, facing: Direction) {
        self.nodes.insert(pos, facing);
    }

    pub fn remove_node(&mut self, pos: BlockPos) -> Option<Direction> {
        self.nodes.remove(&pos)
    }

    /// Place or re-orient a container. An existing inventory is kept.
    pub fn set_container(&mut self, pos: BlockPos, state: ContainerState) {
        self.set_container_with_slots(pos, state, DEFAULT_SLOTS);
    }

    pub fn set_container_with_slots(&mut self, pos: BlockPos, state: ContainerState, slots: usize) {
        self.containers
            .entry(pos)
            .and_modify(|cell| cell.state = state)
            .or_insert_with(|| ContainerCell {
                state,
                inventory: SlotInventory::new(slots),
            });
    }

    pub fn remove_container(&mut self, pos: BlockPos) -> Option<SlotInventory> {
        self.containers.remove(&pos).map(|cell| cell.inventory)
    }

    pub fn set_loaded(&mut self, pos: BlockPos, loaded: bool) {
        if loaded {
            self.unloaded.remove(&pos);
        } else {
            self.unloaded.insert(pos);
        }
    }

    pub fn inventory(&self, pos: BlockPos) -> Option<&SlotInventory> {
        self.containers.get(&pos).map(|cell| &cell.inventory)
    }

    pub fn inventory_mut(&mut self, pos: BlockPos) -> Option<&mut SlotInventory> {
        self.containers.get_mut(&pos).map(|cell| &mut cell.inventory)
    }

    /// Put items into the container at `pos`; returns what did not fit.
    pub fn fill(&mut self, pos: BlockPos, batch: ItemBatch) -> ItemBatch {
        match self.inventory_mut(pos) {
            Some(inv) => inv.fill(batch),
            None => batch,
        }
    }

    /// Items held by the containers at `positions`.
    pub fn total_items<'a, I: IntoIterator<Item = &'a BlockPos>>(&self, positions: I) -> u64 {
        positions
            .into_iter()
            .filter_map(|p| self.inventory(*p))
            .map(SlotInventory::total)
            .sum()
    }

    /// Items held by every container in the world.
    pub fn item_total(&self) -> u64 {
        self.containers.values().map(|c| c.inventory.total()).sum()
    }

    pub fn container_positions(&self) -> Vec<BlockPos> {
        let mut all: Vec<BlockPos> = self.containers.keys().copied().collect();
        all.sort();
        all
    }
}

impl BlockSource for MemoryWorld {
    fn is_loaded(&self, pos: BlockPos) -> bool {
        !self.unloaded.contains(&pos)
    }

    fn node_facing(&self, pos: BlockPos) -> Option<Direction> {
        if !self.is_loaded(pos) {
            return None;
        }
        self.nodes.get(&pos).copied()
    }

    fn container_at(&self, pos: BlockPos) -> Option<ContainerState> {
        if !self.is_loaded(pos) {
            return None;
        }
        self.containers.get(&pos).map(|cell| cell.state)
    }
}

impl ItemStores for MemoryWorld {
    fn store_mut(&mut self, pos: BlockPos) -> Option<&mut dyn ItemStore> {
        if self.unloaded.contains(&pos) {
            return None;
        }
        self.containers
            .get_mut(&pos)
            .map(|cell| &mut cell.inventory as &mut dyn ItemStore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_respects_stack_limit_and_kind() {
        let mut inv = SlotInventory::new(2);
        let rest = inv.insert(0, ItemBatch::new("stone", 70), false);
        assert_eq!(rest.count, 6);
        assert_eq!(inv.slot(0).unwrap().count, 64);

        let rest = inv.insert(0, ItemBatch::new("stone", 1), false);
        assert_eq!(rest.count, 1);

        inv.insert(1, ItemBatch::new("dirt", 3), false);
        let rest = inv.insert(1, ItemBatch::new("stone", 3), false);
        assert_eq!(rest, ItemBatch::new("stone", 3));
    }

    #[test]
    fn test_simulate_changes_nothing() {
        let mut inv = SlotInventory::new(1);
        inv.fill(ItemBatch::new("coal", 10));
        let before = inv.clone();
        assert_eq!(inv.extract(0, 4, true).count, 4);
        assert_eq!(inv.insert(0, ItemBatch::new("coal", 5), true).count, 0);
        assert_eq!(inv, before);
    }

    #[test]
    fn test_extract_clears_empty_slot() {
        let mut inv = SlotInventory::new(1);
        inv.fill(ItemBatch::new("coal", 2));
        assert_eq!(inv.extract(0, 5, false), ItemBatch::new("coal", 2));
        assert!(inv.slot(0).unwrap().is_empty());
        inv.insert(0, ItemBatch::new("iron", 1), false);
        assert_eq!(inv.count_of("iron"), 1);
    }

    #[test]
    fn test_unloaded_cells_report_nothing() {
        let mut world = MemoryWorld::new();
        let pos = BlockPos::new(1, 2, 3);
        world.set_node(pos, Direction::Up);
        world.set_container(BlockPos::new(0, 0, 0), ContainerState::single(Direction::North));
        world.set_loaded(pos, false);
        assert!(!world.is_loaded(pos));
        assert_eq!(world.node_facing(pos), None);
        world.set_loaded(pos, true);
        assert_eq!(world.node_facing(pos), Some(Direction::Up));
        assert!(world.store_mut(BlockPos::new(0, 0, 0)).is_some());
    }
}
