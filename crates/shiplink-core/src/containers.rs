//! Storage container grouping and container ⇄ group links.
//!
//! Containers that form a physical double container share one
//! [`StorageGroup`](crate::network::StorageGroup). A storage group links to a
//! node group when any of its containers touches one of the group's nodes
//! through a face other than the node's facing.

use crate::geometry::{BlockPos, Direction};
use crate::network::{GroupId, Network, primary_of_set};
use crate::world::BlockSource;
use std::collections::{BTreeSet, VecDeque};

/// What removing a container did to its storage group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerRemoval {
    NotTracked,
    /// The last container went away; every link to these groups was dropped.
    Dissolved {
        primary: BlockPos,
        unlinked: Vec<GroupId>,
    },
    /// The storage group survives under `primary` (possibly migrated).
    Shrunk {
        previous: BlockPos,
        primary: BlockPos,
        links_dropped: usize,
    },
}

/// Summary of a full post-load re-validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub nodes_dropped: usize,
    /// Groups whose members no longer formed one connected set.
    pub groups_split: usize,
    pub containers_dropped: usize,
    pub links_dropped: usize,
    pub groups_checked: usize,
}

/// Whether the containers at `a` and `b` are the two halves of one double
/// container.
pub fn forms_pair(world: &dyn BlockSource, a: BlockPos, b: BlockPos) -> bool {
    let (Some(sa), Some(sb)) = (world.container_at(a), world.container_at(b)) else {
        return false;
    };
    let Some(dir) = sa.partner_direction() else {
        return false;
    };
    a.checked_offset(dir) == Some(b) && sa.facing == sb.facing && sb.half == sa.half.complement()
}

/// Every container reachable from `start` through pair links. Empty when
/// `start` is not a container.
pub fn discover_set(world: &dyn BlockSource, start: BlockPos) -> BTreeSet<BlockPos> {
    let mut found = BTreeSet::new();
    if world.container_at(start).is_none() {
        return found;
    }
    let mut queue = VecDeque::from([start]);
    found.insert(start);
    while let Some(current) = queue.pop_front() {
        for dir in Direction::HORIZONTAL {
            let Some(next) = current.checked_offset(dir) else {
                continue;
            };
            if !found.contains(&next) && forms_pair(world, current, next) {
                found.insert(next);
                queue.push_back(next);
            }
        }
    }
    found
}

impl Network {
    /// Primary of the storage group holding the container at `pos`, creating
    /// or extending storage groups as needed.
    pub fn resolve_primary(&mut self, world: &dyn BlockSource, pos: BlockPos) -> Option<BlockPos> {
        if let Some(primary) = self.storage_group_of(pos) {
            return Some(primary);
        }
        let discovered = discover_set(world, pos);
        if discovered.is_empty() {
            return None;
        }

        let existing: BTreeSet<BlockPos> = discovered
            .iter()
            .filter_map(|p| self.storage_group_of(*p))
            .collect();

        if existing.is_empty() {
            let primary = primary_of_set(&discovered)?;
            tracing::debug!(
                "storage group at {} created with {} containers",
                primary,
                discovered.len()
            );
            self.insert_storage_group(primary, discovered);
            return Some(primary);
        }

        let mut members = discovered;
        let mut linked = BTreeSet::new();
        for primary in &existing {
            if let Some(sg) = self.remove_storage_group(*primary) {
                members.extend(sg.members().iter().copied());
                linked.extend(sg.linked().iter().copied());
            }
        }
        let primary = primary_of_set(&members)?;
        self.insert_storage_group(primary, members);
        for id in linked {
            self.link(primary, id);
        }
        tracing::debug!(
            "storage group at {} absorbed {} existing groups",
            primary,
            existing.len()
        );
        Some(primary)
    }

    /// Whether any container of the storage group touches a node of `id`
    /// through one of the node's non-facing faces.
    pub fn is_storage_group_connected(&self, primary: BlockPos, id: GroupId) -> bool {
        let Some(sg) = self.storage_group(primary) else {
            return false;
        };
        sg.members().iter().any(|container| {
            container.neighbors().any(|(dir, neighbor)| {
                self.node(neighbor)
                    .is_some_and(|n| n.group == id && dir.opposite() != n.facing)
            })
        })
    }

    /// Link the container at `pos` to `id` if they touch. Returns whether a
    /// new link was created.
    pub fn link_if_connected(&mut self, world: &dyn BlockSource, pos: BlockPos, id: GroupId) -> bool {
        let Some(primary) = self.resolve_primary(world, pos) else {
            return false;
        };
        if !self.is_storage_group_connected(primary, id) {
            return false;
        }
        let added = self.link(primary, id);
        if added {
            tracing::debug!("linked storage group {} to {}", primary, id);
        }
        added
    }

    /// Link every container touching the node at `pos` to `id`.
    pub(crate) fn scan_containers_around(&mut self, world: &dyn BlockSource, pos: BlockPos, id: GroupId) {
        let Some(facing) = self.node(pos).map(|n| n.facing) else {
            return;
        };
        for (dir, neighbor) in pos.neighbors() {
            if dir != facing && world.container_at(neighbor).is_some() {
                self.link_if_connected(world, neighbor, id);
            }
        }
    }

    /// Handle a container appearing at `pos`. Returns every group it is now
    /// linked to.
    pub fn on_container_appeared(&mut self, world: &dyn BlockSource, pos: BlockPos) -> Vec<GroupId> {
        if !world.is_loaded(pos) {
            return Vec::new();
        }
        let Some(primary) = self.resolve_primary(world, pos) else {
            return Vec::new();
        };

        let net = &*self;
        let candidates: BTreeSet<GroupId> = net
            .storage_members(primary)
            .into_iter()
            .flat_map(|container| {
                container.neighbors().filter_map(move |(dir, neighbor)| {
                    net.node(neighbor)
                        .filter(|n| dir.opposite() != n.facing)
                        .map(|n| n.group)
                })
            })
            .collect();

        for id in &candidates {
            if self.link(primary, *id) {
                tracing::debug!("container at {} linked storage group {} to {}", pos, primary, id);
            }
        }
        candidates.into_iter().collect()
    }

    /// Host notification that the container at `pos` is gone. Ignored when
    /// the world still reports a container there.
    pub fn on_container_disappeared(&mut self, world: &dyn BlockSource, pos: BlockPos) -> ContainerRemoval {
        if world.container_at(pos).is_some() {
            tracing::debug!("ignoring disappearance at {}: container still present", pos);
            return ContainerRemoval::NotTracked;
        }
        self.on_container_removed(pos)
    }

    /// Drop the container at `pos` from its storage group.
    pub fn on_container_removed(&mut self, pos: BlockPos) -> ContainerRemoval {
        let Some(previous) = self.remove_storage_member(pos) else {
            return ContainerRemoval::NotTracked;
        };

        let remaining = self.storage_members(previous);
        let Some(primary) = primary_of_set(&remaining) else {
            let unlinked = self
                .remove_storage_group(previous)
                .map(|sg| sg.linked().iter().copied().collect())
                .unwrap_or_default();
            tracing::debug!("storage group {} dissolved", previous);
            return ContainerRemoval::Dissolved {
                primary: previous,
                unlinked,
            };
        };

        self.rekey_storage_group(previous, primary);
        let links_dropped = self.validate_storage_links(primary);
        ContainerRemoval::Shrunk {
            previous,
            primary,
            links_dropped,
        }
    }

    /// Drop links of group `id` whose containers no longer touch it.
    pub fn validate_group_links(&mut self, id: GroupId) -> usize {
        let primaries: Vec<BlockPos> = match self.group(id) {
            Some(g) => g.containers().iter().copied().collect(),
            None => return 0,
        };
        let mut dropped = 0;
        for primary in primaries {
            if !self.is_storage_group_connected(primary, id) && self.unlink(primary, id) {
                tracing::debug!("unlinked storage group {} from {}", primary, id);
                dropped += 1;
            }
        }
        dropped
    }

    /// Drop links of the storage group at `primary` that are no longer
    /// geometrically true.
    pub fn validate_storage_links(&mut self, primary: BlockPos) -> usize {
        let linked: Vec<GroupId> = match self.storage_group(primary) {
            Some(sg) => sg.linked().iter().copied().collect(),
            None => return 0,
        };
        let mut dropped = 0;
        for id in linked {
            if !self.is_storage_group_connected(primary, id) && self.unlink(primary, id) {
                tracing::debug!("unlinked storage group {} from {}", primary, id);
                dropped += 1;
            }
        }
        dropped
    }

    /// Re-check every node, container and link against the world, and split
    /// groups that are not connected. Cells that are not loaded are left alone.
    pub fn validate_all_connections(&mut self, world: &dyn BlockSource) -> ValidationReport {
        let mut report = ValidationReport::default();

        let mut stale_nodes: Vec<BlockPos> = self
            .groups()
            .flat_map(|g| g.members().iter().copied())
            .filter(|p| world.is_loaded(*p) && world.node_facing(*p).is_none())
            .collect();
        stale_nodes.sort();
        for pos in stale_nodes {
            self.on_node_removed(pos);
            report.nodes_dropped += 1;
        }

        for id in self.group_ids() {
            let Some(members) = self.group(id).map(|g| g.members().clone()) else {
                continue;
            };
            let components = self.connected_components(&members);
            if components.len() > 1 {
                tracing::warn!("{} is not connected, splitting into {} groups", id, components.len());
                self.split_group(id, components);
                report.groups_split += 1;
            }
        }

        for pos in self.tracked_containers() {
            if world.is_loaded(pos) && world.container_at(pos).is_none() {
                self.on_container_removed(pos);
                report.containers_dropped += 1;
            }
        }

        for id in self.group_ids() {
            report.links_dropped += self.validate_group_links(id);
            report.groups_checked += 1;
        }

        tracing::info!(
            "validated {} groups: {} split, {} nodes, {} containers, {} links dropped",
            report.groups_checked,
            report.groups_split,
            report.nodes_dropped,
            report.containers_dropped,
            report.links_dropped
        );
        report
    }
}
