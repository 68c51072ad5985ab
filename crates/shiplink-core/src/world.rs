//! Capabilities the host world exposes to the network.
//!
//! The network never inspects block or entity types itself. The host answers
//! capability queries at the boundary and hands out item stores by position.

use crate::geometry::{BlockPos, Direction};
use serde::{Deserialize, Serialize};

/// Which half of a physical double container a block reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChestHalf {
    #[default]
    Single,
    Left,
    Right,
}

impl ChestHalf {
    pub fn complement(self) -> ChestHalf {
        match self {
            ChestHalf::Single => ChestHalf::Single,
            ChestHalf::Left => ChestHalf::Right,
            ChestHalf::Right => ChestHalf::Left,
        }
    }
}

/// What the host reports about a storage container cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    /// Horizontal orientation of the container.
    pub facing: Direction,
    #[serde(default)]
    pub half: ChestHalf,
}

impl ContainerState {
    pub fn single(facing: Direction) -> Self {
        Self {
            facing,
            half: ChestHalf::Single,
        }
    }

    /// Direction from this half to its partner, if it is one half of a pair.
    pub fn partner_direction(&self) -> Option<Direction> {
        match self.half {
            ChestHalf::Single => None,
            ChestHalf::Left => Some(self.facing.clockwise()),
            ChestHalf::Right => Some(self.facing.counter_clockwise()),
        }
    }
}

/// Read access to the host's block grid.
pub trait BlockSource {
    /// Whether `pos` is currently loaded. Unloaded cells answer "no data".
    fn is_loaded(&self, pos: BlockPos) -> bool;

    /// Facing of the transport node at `pos`, if one is present.
    fn node_facing(&self, pos: BlockPos) -> Option<Direction>;

    /// The container at `pos`, if one is present.
    fn container_at(&self, pos: BlockPos) -> Option<ContainerState>;
}

/// A stack of one item kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ItemBatch {
    pub item: String,
    pub count: u32,
}

impl ItemBatch {
    pub fn new(item: impl Into<String>, count: u32) -> Self {
        Self {
            item: item.into(),
            count,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Same item kind, different count.
    pub fn with_count(&self, count: u32) -> Self {
        Self {
            item: self.item.clone(),
            count,
        }
    }
}

/// Slot-based inventory of a single container.
pub trait ItemStore {
    fn slot_count(&self) -> usize;

    /// Take up to `max` items from `slot`. With `simulate` nothing changes.
    fn extract(&mut self, slot: usize, max: u32, simulate: bool) -> ItemBatch;

    /// Offer `batch` to `slot`; returns what did not fit. With `simulate`
    /// nothing changes.
    fn insert(&mut self, slot: usize, batch: ItemBatch, simulate: bool) -> ItemBatch;
}

/// Hands out the item store of the container at a position.
pub trait ItemStores {
    fn store_mut(&mut self, pos: BlockPos) -> Option<&mut dyn ItemStore>;
}
