//! Scenario files: a small TOML description of a world to replay.

use anyhow::{Context, Result};
use glam::{DQuat, DVec3};
use serde::Deserialize;
use shiplink_core::memory::MemoryWorld;
use shiplink_core::{
    Aabb, BlockPos, ChestHalf, ContainerState, Direction, ItemBatch, Mode, Network, ShiplinkConfig,
    Structure, StructureId, StructureSet, StructureTransform,
};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub structures: Vec<StructureSpec>,
    pub containers: Vec<ContainerSpec>,
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructureSpec {
    pub id: u64,
    #[serde(default)]
    pub translation: [f64; 3],
    /// Rotation about the vertical axis, in degrees.
    #[serde(default)]
    pub yaw: f64,
    /// Half extents of the structure bounds around its origin.
    #[serde(default = "default_extent")]
    pub extent: f64,
}

fn default_extent() -> f64 {
    16.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemSpec {
    pub item: String,
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerSpec {
    pub pos: [i32; 3],
    pub facing: Direction,
    #[serde(default)]
    pub half: ChestHalf,
    #[serde(default = "default_slots")]
    pub slots: usize,
    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

fn default_slots() -> usize {
    shiplink_core::memory::DEFAULT_SLOTS
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    pub pos: [i32; 3],
    pub facing: Direction,
    #[serde(default)]
    pub structure: Option<u64>,
    #[serde(default)]
    pub mode: Option<Mode>,
    /// Register on a later tick instead of immediately.
    #[serde(default)]
    pub deferred: bool,
}

fn block(p: [i32; 3]) -> BlockPos {
    BlockPos::new(p[0], p[1], p[2])
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    pub fn structures(&self) -> StructureSet {
        let mut set = StructureSet::new();
        for spec in &self.structures {
            let transform = StructureTransform::new(
                DVec3::from_array(spec.translation),
                DQuat::from_rotation_y(spec.yaw.to_radians()),
            );
            let local = Aabb::new(DVec3::splat(-spec.extent), DVec3::splat(spec.extent));
            set.upsert(Structure {
                id: StructureId(spec.id),
                transform,
                bounds: transform.aabb(&local),
            });
        }
        set
    }

    /// The block grid alone: every container with its items, every node cell.
    pub fn world(&self) -> Result<MemoryWorld> {
        let mut world = MemoryWorld::new();
        for spec in &self.containers {
            let pos = block(spec.pos);
            world.set_container_with_slots(
                pos,
                ContainerState {
                    facing: spec.facing,
                    half: spec.half,
                },
                spec.slots,
            );
            for item in &spec.items {
                let rest = world.fill(pos, ItemBatch::new(item.item.clone(), item.count));
                if !rest.is_empty() {
                    anyhow::bail!(
                        "container at {} cannot hold {} more {}",
                        pos,
                        rest.count,
                        rest.item
                    );
                }
            }
        }
        for spec in &self.nodes {
            world.set_node(block(spec.pos), spec.facing);
        }
        Ok(world)
    }

    /// The world plus a network built by replaying every node placement.
    pub fn build(&self, config: ShiplinkConfig) -> Result<(MemoryWorld, Network)> {
        let world = self.world()?;
        let mut net = Network::new(config);

        for spec in &self.nodes {
            let pos = block(spec.pos);
            let structure = spec.structure.map(StructureId);
            if spec.deferred {
                net.queue_node_placement(pos, structure, spec.facing);
                continue;
            }
            let placement = net
                .on_node_placed(&world, pos, structure, spec.facing)
                .with_context(|| format!("failed to place node at {}", pos))?;
            if let Some(mode) = spec.mode
                && net.mode_of(placement.group()) != Some(mode)
            {
                net.toggle_mode(placement.group())?;
            }
        }
        Ok((world, net))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCK: &str = r#"
[[structures]]
id = 1
translation = [7.0, 0.0, 0.0]

[[containers]]
pos = [4, 0, 1]
facing = "north"
items = [{ item = "stone", count = 10 }]

[[containers]]
pos = [0, 0, 1]
facing = "north"
slots = 1
items = [{ item = "stone", count = 61 }]

[[nodes]]
pos = [4, 0, 0]
facing = "east"
mode = "export"

[[nodes]]
pos = [0, 0, 0]
facing = "west"
structure = 1
"#;

    #[test]
    fn test_build_dock_scenario() {
        let scenario: Scenario = toml::from_str(DOCK).unwrap();
        let (world, net) = scenario.build(ShiplinkConfig::default()).unwrap();
        assert_eq!(net.group_ids().len(), 2);
        let exporter = net.group_of(BlockPos::new(4, 0, 0)).unwrap();
        assert_eq!(net.mode_of(exporter), Some(Mode::Export));
        assert_eq!(world.item_total(), 71);
        assert_eq!(scenario.structures().len(), 1);
    }

    #[test]
    fn test_overfull_container_is_rejected() {
        let scenario: Scenario = toml::from_str(
            r#"
[[containers]]
pos = [0, 0, 0]
facing = "north"
slots = 1
items = [{ item = "stone", count = 65 }]
"#,
        )
        .unwrap();
        let err = scenario.world().unwrap_err();
        assert!(err.to_string().contains("cannot hold 1 more stone"));
    }
}
