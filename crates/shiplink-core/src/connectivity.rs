//! Incremental maintenance of node groups under placement and removal.
//!
//! Two nodes connect when they are grid neighbours with the same facing, the
//! same structure, and the same coordinate along the facing axis. Groups grow
//! sideways across the plane perpendicular to their facing; the facing axis
//! itself never joins nodes.

use crate::geometry::{BlockPos, Direction, StructureId};
use crate::network::{GroupId, Mode, Network, NetworkError, Node};
use crate::world::BlockSource;
use std::collections::{BTreeSet, HashSet};

/// How a placement was absorbed into the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// The position was already owned; nothing changed.
    AlreadyOwned(GroupId),
    /// No connectable neighbour: a new singleton group.
    Created(GroupId),
    /// Exactly one neighbouring group took the node.
    Joined(GroupId),
    /// Several neighbouring groups fused through the new node.
    Merged { into: GroupId, absorbed: Vec<GroupId> },
}

impl Placement {
    pub fn group(&self) -> GroupId {
        match self {
            Placement::AlreadyOwned(id)
            | Placement::Created(id)
            | Placement::Joined(id)
            | Placement::Merged { into: id, .. } => *id,
        }
    }
}

/// What a removal did to the owning group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// No node at that position.
    NotTracked,
    /// The group lost one member and is still connected.
    Shrunk(GroupId),
    /// The last member went away; the group is gone.
    Dissolved(GroupId),
    /// The group fell apart into several new groups.
    Split { from: GroupId, into: Vec<GroupId> },
}

/// Adjacency predicate between two node descriptions.
fn connects(
    a: BlockPos,
    a_facing: Direction,
    a_structure: Option<StructureId>,
    b: BlockPos,
    b_node: &Node,
) -> bool {
    a_facing == b_node.facing
        && a_structure == b_node.structure
        && a.coord(a_facing.axis()) == b.coord(a_facing.axis())
}

impl Network {
    /// Whether both positions hold nodes that may join the same group.
    pub fn can_connect(&self, a: BlockPos, b: BlockPos) -> bool {
        match (self.node(a), self.node(b)) {
            (Some(na), Some(nb)) => connects(a, na.facing, na.structure, b, nb),
            _ => false,
        }
    }

    /// Handle a transport node appearing at `pos`.
    ///
    /// Joins, creates or merges groups, then links any containers touching the
    /// new node through a side other than its facing.
    pub fn on_node_placed(
        &mut self,
        world: &dyn BlockSource,
        pos: BlockPos,
        structure: Option<StructureId>,
        facing: Direction,
    ) -> Result<Placement, NetworkError> {
        if let Some(existing) = self.group_of(pos) {
            tracing::debug!("{} already belongs to {}", pos, existing);
            return Ok(Placement::AlreadyOwned(existing));
        }
        if !world.is_loaded(pos) {
            return Err(NetworkError::NotLoaded { pos });
        }

        let candidates: BTreeSet<GroupId> = pos
            .neighbors()
            .filter_map(|(_, n)| {
                let node = self.node(n)?;
                connects(pos, facing, structure, n, node).then_some(node.group)
            })
            .collect();

        let placement = match (candidates.len(), candidates.first().copied()) {
            (_, None) => {
                let id = self.create_group(Mode::Import, facing, structure, [pos]);
                tracing::debug!("created {} at {}", id, pos);
                Placement::Created(id)
            }
            (1, Some(id)) => {
                self.add_node(id, pos);
                tracing::debug!("{} joined {} ({} nodes)", pos, id, self.member_count(id));
                Placement::Joined(id)
            }
            _ => self.merge_through(pos, facing, &candidates)?,
        };

        self.scan_containers_around(world, pos, placement.group());
        Ok(placement)
    }

    /// Fuse every group in `candidates` plus the node at `pos` into the
    /// largest of them.
    fn merge_through(
        &mut self,
        pos: BlockPos,
        facing: Direction,
        candidates: &BTreeSet<GroupId>,
    ) -> Result<Placement, NetworkError> {
        if candidates
            .iter()
            .filter_map(|id| self.group(*id))
            .any(|g| g.facing != facing)
        {
            tracing::warn!("cannot merge groups around {}: facing differs", pos);
            return Err(NetworkError::FacingConflict { pos });
        }

        let survivor = candidates
            .iter()
            .copied()
            .max_by_key(|id| (self.member_count(*id), std::cmp::Reverse(*id)))
            .ok_or(NetworkError::FacingConflict { pos })?;

        let mut absorbed = Vec::new();
        let mut moved_nodes = Vec::new();
        let mut moved_links = BTreeSet::new();
        for id in candidates.iter().copied().filter(|id| *id != survivor) {
            if let Some(group) = self.remove_group(id) {
                moved_nodes.extend(group.members().iter().copied());
                moved_links.extend(group.containers().iter().copied());
                absorbed.push(id);
            }
        }

        for member in moved_nodes {
            self.add_node(survivor, member);
        }
        self.add_node(survivor, pos);
        for primary in moved_links {
            self.link(primary, survivor);
        }

        tracing::info!(
            "merged {} groups into {} ({} nodes, {} storage groups)",
            absorbed.len() + 1,
            survivor,
            self.member_count(survivor),
            self.linked_container_count(survivor)
        );
        Ok(Placement::Merged {
            into: survivor,
            absorbed,
        })
    }

    /// Handle the transport node at `pos` disappearing.
    pub fn on_node_removed(&mut self, pos: BlockPos) -> Removal {
        let Some(node) = self.remove_node(pos) else {
            return Removal::NotTracked;
        };
        let id = node.group;

        let remaining: BTreeSet<BlockPos> = match self.group(id) {
            Some(group) => group.members().clone(),
            None => return Removal::NotTracked,
        };

        if remaining.is_empty() {
            self.remove_group(id);
            tracing::debug!("{} dissolved with removal at {}", id, pos);
            return Removal::Dissolved(id);
        }

        let components = self.connected_components(&remaining);
        if components.len() == 1 {
            let dropped = self.validate_group_links(id);
            tracing::debug!(
                "{} shrank to {} nodes, {} storage links dropped",
                id,
                remaining.len(),
                dropped
            );
            return Removal::Shrunk(id);
        }

        let into = self.split_group(id, components);
        if into.is_empty() {
            return Removal::NotTracked;
        }
        Removal::Split { from: id, into }
    }

    /// Replace group `id` with one new group per component. Each inherits
    /// mode, facing and structure, and keeps the storage links it still
    /// touches.
    pub(crate) fn split_group(&mut self, id: GroupId, components: Vec<Vec<BlockPos>>) -> Vec<GroupId> {
        let Some(original) = self.remove_group(id) else {
            return Vec::new();
        };
        let mut into = Vec::with_capacity(components.len());
        for component in components {
            let new_id = self.create_group(
                original.mode,
                original.facing,
                original.structure,
                component,
            );
            for primary in original.containers() {
                if self.is_storage_group_connected(*primary, new_id) {
                    self.link(*primary, new_id);
                }
            }
            into.push(new_id);
        }

        tracing::info!(
            "{} split into {} groups (mode {})",
            id,
            into.len(),
            original.mode
        );
        into
    }

    /// Connected components of `members` under [`Network::can_connect`],
    /// ordered by their smallest position.
    pub(crate) fn connected_components(&self, members: &BTreeSet<BlockPos>) -> Vec<Vec<BlockPos>> {
        let mut visited: HashSet<BlockPos> = HashSet::with_capacity(members.len());
        let mut components = Vec::new();

        for &start in members {
            if visited.contains(&start) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            while let Some(current) = stack.pop() {
                if !visited.insert(current) {
                    continue;
                }
                component.push(current);
                for (_, neighbor) in current.neighbors() {
                    if members.contains(&neighbor)
                        && !visited.contains(&neighbor)
                        && self.can_connect(current, neighbor)
                    {
                        stack.push(neighbor);
                    }
                }
            }
            component.sort();
            components.push(component);
        }

        components
    }
}
