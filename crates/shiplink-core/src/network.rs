//! Relational model of one world's transport network.
//!
//! [`Network`] owns every table (nodes, groups, storage groups, links) and is
//! the only place that mutates them. Each mutator keeps both directions of a
//! relation in sync: position → group and group → members, container →
//! primary and primary → members, storage group ⇄ group links.

use crate::config::ShiplinkConfig;
use crate::geometry::{BlockPos, Direction, StructureId};
use crate::pending::PendingQueue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Identity of a node group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Transfer direction of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Import,
    Export,
}

impl Mode {
    pub fn toggled(self) -> Mode {
        match self {
            Mode::Import => Mode::Export,
            Mode::Export => Mode::Import,
        }
    }

    pub fn is_import(self) -> bool {
        self == Mode::Import
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Import => f.write_str("import"),
            Mode::Export => f.write_str("export"),
        }
    }
}

/// Where a group lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureInfo {
    Grounded,
    OnStructure(StructureId),
}

impl From<Option<StructureId>> for StructureInfo {
    fn from(structure: Option<StructureId>) -> Self {
        match structure {
            None => StructureInfo::Grounded,
            Some(id) => StructureInfo::OnStructure(id),
        }
    }
}

/// A single transport node cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub facing: Direction,
    pub structure: Option<StructureId>,
    pub group: GroupId,
}

/// A maximal connected set of nodes sharing facing and structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub mode: Mode,
    pub facing: Direction,
    pub structure: Option<StructureId>,
    members: BTreeSet<BlockPos>,
    /// Primaries of linked storage groups.
    containers: BTreeSet<BlockPos>,
}

impl Group {
    pub fn members(&self) -> &BTreeSet<BlockPos> {
        &self.members
    }

    pub fn containers(&self) -> &BTreeSet<BlockPos> {
        &self.containers
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// One or two paired containers acting as a single inventory surface.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageGroup {
    pub primary: BlockPos,
    members: BTreeSet<BlockPos>,
    linked: BTreeSet<GroupId>,
}

impl StorageGroup {
    pub fn members(&self) -> &BTreeSet<BlockPos> {
        &self.members
    }

    pub fn linked(&self) -> &BTreeSet<GroupId> {
        &self.linked
    }
}

/// Deterministic primary for a container set: minimum by (X, Z, Y).
pub fn primary_of_set<'a, I: IntoIterator<Item = &'a BlockPos>>(members: I) -> Option<BlockPos> {
    members.into_iter().copied().min_by_key(|p| p.primary_key())
}

/// Errors from network operations. An error always means nothing changed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("groups adjacent to {pos} disagree on facing, merge aborted")]
    FacingConflict { pos: BlockPos },
    #[error("{pos} is not loaded")]
    NotLoaded { pos: BlockPos },
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),
}

/// The transport network of a single world.
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) config: ShiplinkConfig,
    nodes: HashMap<BlockPos, Node>,
    groups: BTreeMap<GroupId, Group>,
    storage: BTreeMap<BlockPos, StorageGroup>,
    container_primary: HashMap<BlockPos, BlockPos>,
    next_group_id: u64,
    dirty: bool,
    dirty_groups: BTreeSet<GroupId>,
    pub(crate) pending: PendingQueue,
    pub(crate) ticks_since_run: u32,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(ShiplinkConfig::default())
    }
}

impl Network {
    pub fn new(config: ShiplinkConfig) -> Self {
        Self {
            config,
            nodes: HashMap::new(),
            groups: BTreeMap::new(),
            storage: BTreeMap::new(),
            container_primary: HashMap::new(),
            next_group_id: 1,
            dirty: false,
            dirty_groups: BTreeSet::new(),
            pending: PendingQueue::default(),
            ticks_since_run: 0,
        }
    }

    pub fn config(&self) -> &ShiplinkConfig {
        &self.config
    }

    /// Adjust settings at runtime; applies from the next tick.
    pub fn config_mut(&mut self) -> &mut ShiplinkConfig {
        &mut self.config
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn group_of(&self, pos: BlockPos) -> Option<GroupId> {
        self.nodes.get(&pos).map(|n| n.group)
    }

    /// Number of nodes in `id`, zero for unknown groups.
    pub fn member_count(&self, id: GroupId) -> usize {
        self.groups.get(&id).map_or(0, Group::len)
    }

    /// Number of storage groups linked to `id`, zero for unknown groups.
    pub fn linked_container_count(&self, id: GroupId) -> usize {
        self.groups.get(&id).map_or(0, |g| g.containers.len())
    }

    pub fn mode_of(&self, id: GroupId) -> Option<Mode> {
        self.groups.get(&id).map(|g| g.mode)
    }

    pub fn structure_info(&self, id: GroupId) -> Option<StructureInfo> {
        self.groups.get(&id).map(|g| g.structure.into())
    }

    pub fn toggle_mode(&mut self, id: GroupId) -> Result<Mode, NetworkError> {
        let group = self
            .groups
            .get_mut(&id)
            .ok_or(NetworkError::UnknownGroup(id))?;
        group.mode = group.mode.toggled();
        let mode = group.mode;
        self.mark(id);
        tracing::info!("{} toggled to {} mode", id, mode);
        Ok(mode)
    }

    pub fn node(&self, pos: BlockPos) -> Option<&Node> {
        self.nodes.get(&pos)
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.keys().copied().collect()
    }

    /// Member positions of `id`, sorted.
    pub fn members(&self, id: GroupId) -> Vec<BlockPos> {
        self.groups
            .get(&id)
            .map(|g| g.members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn storage_group(&self, primary: BlockPos) -> Option<&StorageGroup> {
        self.storage.get(&primary)
    }

    pub fn storage_groups(&self) -> impl Iterator<Item = &StorageGroup> {
        self.storage.values()
    }

    /// Containers of the storage group keyed by `primary`, sorted.
    pub fn storage_members(&self, primary: BlockPos) -> Vec<BlockPos> {
        self.storage
            .get(&primary)
            .map(|sg| sg.members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Primary of the storage group containing `pos`.
    pub fn storage_group_of(&self, pos: BlockPos) -> Option<BlockPos> {
        self.container_primary.get(&pos).copied()
    }

    pub fn tracked_containers(&self) -> Vec<BlockPos> {
        let mut all: Vec<BlockPos> = self.container_primary.keys().copied().collect();
        all.sort();
        all
    }

    /// Every container position linked to `id`, across all of its storage groups.
    pub fn linked_containers(&self, id: GroupId) -> Vec<BlockPos> {
        let Some(group) = self.groups.get(&id) else {
            return Vec::new();
        };
        group
            .containers
            .iter()
            .filter_map(|p| self.storage.get(p))
            .flat_map(|sg| sg.members.iter().copied())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Change tracking
    // -----------------------------------------------------------------------

    /// Whether anything changed since the last [`Network::clear_dirty`].
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Drain groups whose member count, link count or mode changed.
    pub fn take_dirty_groups(&mut self) -> BTreeSet<GroupId> {
        std::mem::take(&mut self.dirty_groups)
    }

    fn mark(&mut self, id: GroupId) {
        self.dirty = true;
        self.dirty_groups.insert(id);
    }

    // -----------------------------------------------------------------------
    // Group table
    // -----------------------------------------------------------------------

    /// Create a group owning `members`. Positions owned elsewhere move over.
    pub(crate) fn create_group(
        &mut self,
        mode: Mode,
        facing: Direction,
        structure: Option<StructureId>,
        members: impl IntoIterator<Item = BlockPos>,
    ) -> GroupId {
        let mut raw = self.next_group_id;
        if self.groups.contains_key(&GroupId(raw)) {
            // Counter saturated at the top of the id space; reuse a free id.
            raw = (1..u64::MAX)
                .find(|n| !self.groups.contains_key(&GroupId(*n)))
                .unwrap_or(raw);
        }
        let id = GroupId(raw);
        self.install_group(id, mode, facing, structure);
        for pos in members {
            self.add_node(id, pos);
        }
        id
    }

    /// Register an empty group under a known id (used when restoring saves).
    pub(crate) fn install_group(
        &mut self,
        id: GroupId,
        mode: Mode,
        facing: Direction,
        structure: Option<StructureId>,
    ) {
        self.next_group_id = self.next_group_id.max(id.0.saturating_add(1));
        self.groups.insert(
            id,
            Group {
                id,
                mode,
                facing,
                structure,
                members: BTreeSet::new(),
                containers: BTreeSet::new(),
            },
        );
        self.mark(id);
    }

    /// Delete a group, its node entries and every link it holds. The returned
    /// group still lists its former members and linked primaries.
    pub(crate) fn remove_group(&mut self, id: GroupId) -> Option<Group> {
        let group = self.groups.remove(&id)?;
        for pos in &group.members {
            if self.nodes.get(pos).is_some_and(|n| n.group == id) {
                self.nodes.remove(pos);
            }
        }
        for primary in &group.containers {
            if let Some(sg) = self.storage.get_mut(primary) {
                sg.linked.remove(&id);
            }
        }
        self.mark(id);
        Some(group)
    }

    /// Put the node at `pos` into group `id`, taking on the group's facing and
    /// structure.
    pub(crate) fn add_node(&mut self, id: GroupId, pos: BlockPos) -> bool {
        if let Some(previous) = self.nodes.get(&pos).map(|n| n.group)
            && previous != id
            && let Some(old) = self.groups.get_mut(&previous)
        {
            old.members.remove(&pos);
            self.mark(previous);
        }
        let Some(group) = self.groups.get_mut(&id) else {
            return false;
        };
        group.members.insert(pos);
        self.nodes.insert(
            pos,
            Node {
                facing: group.facing,
                structure: group.structure,
                group: id,
            },
        );
        self.mark(id);
        true
    }

    /// Drop the node at `pos` from the node table and its group. Empty groups
    /// are left for the caller to delete.
    pub(crate) fn remove_node(&mut self, pos: BlockPos) -> Option<Node> {
        let node = self.nodes.remove(&pos)?;
        if let Some(group) = self.groups.get_mut(&node.group) {
            group.members.remove(&pos);
        }
        self.mark(node.group);
        Some(node)
    }

    // -----------------------------------------------------------------------
    // Storage group table
    // -----------------------------------------------------------------------

    pub(crate) fn insert_storage_group(&mut self, primary: BlockPos, members: BTreeSet<BlockPos>) {
        for pos in &members {
            self.container_primary.insert(*pos, primary);
        }
        self.storage.insert(
            primary,
            StorageGroup {
                primary,
                members,
                linked: BTreeSet::new(),
            },
        );
        self.dirty = true;
    }

    /// Delete a storage group and every link to it.
    pub(crate) fn remove_storage_group(&mut self, primary: BlockPos) -> Option<StorageGroup> {
        let sg = self.storage.remove(&primary)?;
        for pos in &sg.members {
            if self.container_primary.get(pos) == Some(&primary) {
                self.container_primary.remove(pos);
            }
        }
        for id in &sg.linked {
            if let Some(group) = self.groups.get_mut(id) {
                group.containers.remove(&primary);
            }
        }
        for id in sg.linked.clone() {
            self.mark(id);
        }
        self.dirty = true;
        Some(sg)
    }

    /// Remove one container from its storage group. Returns the group's
    /// primary; the group may now be empty.
    pub(crate) fn remove_storage_member(&mut self, pos: BlockPos) -> Option<BlockPos> {
        let primary = self.container_primary.remove(&pos)?;
        if let Some(sg) = self.storage.get_mut(&primary) {
            sg.members.remove(&pos);
        }
        self.dirty = true;
        Some(primary)
    }

    /// Move a storage group to a new primary, carrying every link along.
    pub(crate) fn rekey_storage_group(&mut self, old: BlockPos, new: BlockPos) {
        if old == new {
            return;
        }
        let Some(mut sg) = self.storage.remove(&old) else {
            return;
        };
        sg.primary = new;
        for pos in &sg.members {
            self.container_primary.insert(*pos, new);
        }
        for id in &sg.linked {
            if let Some(group) = self.groups.get_mut(id) {
                group.containers.remove(&old);
                group.containers.insert(new);
            }
        }
        for id in sg.linked.clone() {
            self.mark(id);
        }
        self.storage.insert(new, sg);
        tracing::debug!("storage group primary moved {} -> {}", old, new);
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    /// Link a storage group and a group in both directions. Returns whether a
    /// new link was created.
    pub(crate) fn link(&mut self, primary: BlockPos, id: GroupId) -> bool {
        if !self.groups.contains_key(&id) {
            return false;
        }
        let Some(sg) = self.storage.get_mut(&primary) else {
            return false;
        };
        let added = sg.linked.insert(id);
        if let Some(group) = self.groups.get_mut(&id) {
            group.containers.insert(primary);
        }
        if added {
            self.mark(id);
        }
        added
    }

    pub(crate) fn unlink(&mut self, primary: BlockPos, id: GroupId) -> bool {
        let removed = self
            .storage
            .get_mut(&primary)
            .is_some_and(|sg| sg.linked.remove(&id));
        if let Some(group) = self.groups.get_mut(&id) {
            group.containers.remove(&primary);
        }
        if removed {
            self.mark(id);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32, y: i32, z: i32) -> BlockPos {
        BlockPos::new(x, y, z)
    }

    #[test]
    fn test_create_and_remove_group_keeps_tables_in_sync() {
        let mut net = Network::default();
        let id = net.create_group(
            Mode::Import,
            Direction::East,
            None,
            [pos(0, 0, 0), pos(0, 0, 1)],
        );
        assert_eq!(net.group_of(pos(0, 0, 1)), Some(id));
        assert_eq!(net.member_count(id), 2);

        let removed = net.remove_group(id).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(net.group_of(pos(0, 0, 0)), None);
        assert_eq!(net.node_count(), 0);
    }

    #[test]
    fn test_link_is_bidirectional_and_rekey_moves_links() {
        let mut net = Network::default();
        let id = net.create_group(Mode::Export, Direction::Up, None, [pos(0, 0, 0)]);
        net.insert_storage_group(pos(1, 0, 0), [pos(1, 0, 0), pos(2, 0, 0)].into());
        assert!(net.link(pos(1, 0, 0), id));
        assert!(!net.link(pos(1, 0, 0), id));
        assert_eq!(net.linked_container_count(id), 1);
        assert_eq!(net.linked_containers(id).len(), 2);

        net.rekey_storage_group(pos(1, 0, 0), pos(2, 0, 0));
        assert_eq!(net.storage_group_of(pos(1, 0, 0)), Some(pos(2, 0, 0)));
        assert!(net.group(id).unwrap().containers().contains(&pos(2, 0, 0)));
        assert!(net.storage_group(pos(2, 0, 0)).unwrap().linked().contains(&id));

        net.remove_storage_group(pos(2, 0, 0));
        assert_eq!(net.linked_container_count(id), 0);
        assert_eq!(net.storage_group_of(pos(1, 0, 0)), None);
    }

    #[test]
    fn test_toggle_mode_marks_group_dirty() {
        let mut net = Network::default();
        let id = net.create_group(Mode::Import, Direction::Up, None, [pos(0, 0, 0)]);
        net.take_dirty_groups();
        assert_eq!(net.toggle_mode(id), Ok(Mode::Export));
        assert_eq!(net.mode_of(id), Some(Mode::Export));
        assert!(net.take_dirty_groups().contains(&id));
        assert_eq!(
            net.toggle_mode(GroupId(999)),
            Err(NetworkError::UnknownGroup(GroupId(999)))
        );
    }

    #[test]
    fn test_primary_of_set_is_min_x_z_y() {
        let set = [pos(1, 0, 0), pos(0, 3, 2), pos(0, 0, 5)];
        assert_eq!(primary_of_set(&set), Some(pos(0, 3, 2)));
    }
}
