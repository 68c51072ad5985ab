//! Grid positions, cardinal directions, boxes and structure transforms.
//!
//! Every world-space computation in the crate goes through [`StructureSet`]:
//! grounded content (no structure) passes through unchanged, structure content
//! is rotated then translated into world space.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An integer grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The neighbouring cell one step in `dir`. Wraps at the `i32` bounds.
    pub fn offset(self, dir: Direction) -> Self {
        let (dx, dy, dz) = dir.step();
        Self::new(
            self.x.wrapping_add(dx),
            self.y.wrapping_add(dy),
            self.z.wrapping_add(dz),
        )
    }

    /// The neighbouring cell one step in `dir`, or `None` past the grid edge.
    pub fn checked_offset(self, dir: Direction) -> Option<Self> {
        let (dx, dy, dz) = dir.step();
        Some(Self::new(
            self.x.checked_add(dx)?,
            self.y.checked_add(dy)?,
            self.z.checked_add(dz)?,
        ))
    }

    /// Face neighbours in [`Direction::ALL`] order. Cells at the grid edge
    /// have fewer than six.
    pub fn neighbors(self) -> impl Iterator<Item = (Direction, BlockPos)> {
        Direction::ALL
            .into_iter()
            .filter_map(move |d| self.checked_offset(d).map(|n| (d, n)))
    }

    /// The cell's minimum corner as a point.
    pub fn corner(self) -> DVec3 {
        DVec3::new(f64::from(self.x), f64::from(self.y), f64::from(self.z))
    }

    /// Sort key used to pick a storage group's primary: X, then Z, then Y.
    pub fn primary_key(self) -> (i32, i32, i32) {
        (self.x, self.z, self.y)
    }

    pub fn coord(self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn of(self, v: DVec3) -> f64 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }

    /// The two axes perpendicular to this one.
    pub fn others(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::X, Axis::Z),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }
}

/// One of the six cardinal grid directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// +X
    East,
    /// -X
    West,
    /// +Y
    Up,
    /// -Y
    Down,
    /// +Z
    South,
    /// -Z
    North,
}

impl Direction {
    /// Fixed enumeration order: +X, -X, +Y, -Y, +Z, -Z. Snapping ties resolve
    /// to the earliest entry.
    pub const ALL: [Direction; 6] = [
        Direction::East,
        Direction::West,
        Direction::Up,
        Direction::Down,
        Direction::South,
        Direction::North,
    ];

    pub const HORIZONTAL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn step(self) -> (i32, i32, i32) {
        match self {
            Direction::East => (1, 0, 0),
            Direction::West => (-1, 0, 0),
            Direction::Up => (0, 1, 0),
            Direction::Down => (0, -1, 0),
            Direction::South => (0, 0, 1),
            Direction::North => (0, 0, -1),
        }
    }

    pub fn unit(self) -> DVec3 {
        let (x, y, z) = self.step();
        DVec3::new(f64::from(x), f64::from(y), f64::from(z))
    }

    pub fn axis(self) -> Axis {
        match self {
            Direction::East | Direction::West => Axis::X,
            Direction::Up | Direction::Down => Axis::Y,
            Direction::South | Direction::North => Axis::Z,
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(self, Direction::East | Direction::Up | Direction::South)
    }

    pub fn is_horizontal(self) -> bool {
        self.axis() != Axis::Y
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::South => Direction::North,
            Direction::North => Direction::South,
        }
    }

    /// Quarter turn clockwise seen from above. Vertical directions are fixed.
    pub fn clockwise(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
            vertical => vertical,
        }
    }

    pub fn counter_clockwise(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
            vertical => vertical,
        }
    }

    /// The direction whose unit vector has the largest dot product with `v`.
    pub fn snap(v: DVec3) -> Direction {
        let mut best = Direction::ALL[0];
        let mut best_dot = f64::NEG_INFINITY;
        for dir in Direction::ALL {
            let dot = dir.unit().dot(v);
            if dot > best_dot {
                best = dir;
                best_dot = dot;
            }
        }
        best
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::East => "east",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::South => "south",
            Direction::North => "north",
        };
        f.write_str(name)
    }
}

/// Axis-aligned box. `min <= max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// The unit box occupied by a grid cell.
    pub fn of_block(pos: BlockPos) -> Self {
        let corner = pos.corner();
        Self::new(corner, corner + DVec3::ONE)
    }

    /// Smallest box covering every cell in `positions`, or `None` if empty.
    pub fn covering<I: IntoIterator<Item = BlockPos>>(positions: I) -> Option<Self> {
        positions
            .into_iter()
            .map(Self::of_block)
            .reduce(|acc, b| acc.union(&b))
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grow the box by `amount` on the side `dir` points to.
    pub fn extended(&self, dir: Direction, amount: f64) -> Aabb {
        let delta = dir.unit() * amount;
        if dir.is_positive() {
            Aabb {
                min: self.min,
                max: self.max + delta,
            }
        } else {
            Aabb {
                min: self.min + delta,
                max: self.max,
            }
        }
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Inclusive overlap test on all three axes; touching faces intersect.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn contains(&self, p: DVec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Signed overlap length along `axis`; zero or negative means disjoint.
    pub fn overlap_on(&self, other: &Aabb, axis: Axis) -> f64 {
        axis.of(self.max).min(axis.of(other.max)) - axis.of(self.min).max(axis.of(other.min))
    }

    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(a.x, b.y, b.z),
            DVec3::new(b.x, b.y, b.z),
        ]
    }
}

/// Identity of an independently moving rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureId(pub u64);

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "structure#{}", self.0)
    }
}

/// Rotation followed by translation, mapping structure-local points to world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureTransform {
    pub translation: DVec3,
    pub rotation: DQuat,
}

impl Default for StructureTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl StructureTransform {
    pub const IDENTITY: Self = Self {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    pub fn new(translation: DVec3, rotation: DQuat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn point(&self, local: DVec3) -> DVec3 {
        self.rotation * local + self.translation
    }

    pub fn vector(&self, local: DVec3) -> DVec3 {
        self.rotation * local
    }

    /// World box enclosing the transformed corners of `local`.
    pub fn aabb(&self, local: &Aabb) -> Aabb {
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        for corner in local.corners() {
            let p = self.point(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Aabb { min, max }
    }
}

/// A rigid body as reported by the host for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub id: StructureId,
    pub transform: StructureTransform,
    /// World-space bounds.
    pub bounds: Aabb,
}

/// Read-only view of every structure in one world. The host replaces entries
/// as transforms change; nothing here computes motion.
#[derive(Debug, Clone, Default)]
pub struct StructureSet {
    structures: BTreeMap<StructureId, Structure>,
}

impl StructureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, structure: Structure) {
        self.structures.insert(structure.id, structure);
    }

    pub fn remove(&mut self, id: StructureId) -> Option<Structure> {
        self.structures.remove(&id)
    }

    pub fn get(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(&id)
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    /// Transform for `structure`, falling back to identity when grounded or
    /// when the id no longer resolves.
    pub fn transform_of(&self, structure: Option<StructureId>) -> StructureTransform {
        match structure {
            None => StructureTransform::IDENTITY,
            Some(id) => match self.structures.get(&id) {
                Some(s) => s.transform,
                None => {
                    tracing::debug!("{} no longer resolves, treating as grounded", id);
                    StructureTransform::IDENTITY
                }
            },
        }
    }

    /// `structure` if it still resolves, `None` (grounded) otherwise.
    pub fn resolve(&self, structure: Option<StructureId>) -> Option<StructureId> {
        structure.filter(|id| self.structures.contains_key(id))
    }

    pub fn world_position(&self, structure: Option<StructureId>, local: DVec3) -> DVec3 {
        self.transform_of(structure).point(local)
    }

    pub fn world_direction(&self, structure: Option<StructureId>, local: Direction) -> DVec3 {
        self.transform_of(structure).vector(local.unit())
    }

    /// World facing of a local direction, snapped back onto the grid axes.
    pub fn world_facing(&self, structure: Option<StructureId>, local: Direction) -> Direction {
        Direction::snap(self.world_direction(structure, local))
    }

    pub fn world_aabb(&self, structure: Option<StructureId>, local: &Aabb) -> Aabb {
        match structure {
            None => *local,
            Some(_) => self.transform_of(structure).aabb(local),
        }
    }

    /// First structure (lowest id) whose bounds contain `world`.
    pub fn find_containing(&self, world: DVec3) -> Option<StructureId> {
        self.structures
            .values()
            .find(|s| s.bounds.contains(world))
            .map(|s| s.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_snap_picks_max_dot() {
        assert_eq!(Direction::snap(DVec3::new(0.9, 0.1, -0.2)), Direction::East);
        assert_eq!(Direction::snap(DVec3::new(0.0, -3.0, 1.0)), Direction::Down);
        assert_eq!(Direction::snap(DVec3::new(0.1, 0.2, -0.7)), Direction::North);
    }

    #[test]
    fn test_snap_ties_follow_enumeration_order() {
        assert_eq!(Direction::snap(DVec3::new(1.0, 1.0, 0.0)), Direction::East);
        assert_eq!(Direction::snap(DVec3::new(0.0, 1.0, 1.0)), Direction::Up);
        assert_eq!(Direction::snap(DVec3::ZERO), Direction::East);
    }

    #[test]
    fn test_rotation_quarter_turn_maps_facing() {
        let mut set = StructureSet::new();
        let id = StructureId(7);
        set.upsert(Structure {
            id,
            transform: StructureTransform::new(DVec3::ZERO, DQuat::from_rotation_y(FRAC_PI_2)),
            bounds: Aabb::new(DVec3::splat(-10.0), DVec3::splat(10.0)),
        });
        // +X rotated a quarter turn about +Y points to -Z.
        assert_eq!(set.world_facing(Some(id), Direction::East), Direction::North);
        assert_eq!(set.world_facing(Some(id), Direction::Up), Direction::Up);
    }

    #[test]
    fn test_grounded_and_missing_structure_pass_through() {
        let set = StructureSet::new();
        let p = DVec3::new(1.5, 2.0, -3.0);
        assert_eq!(set.world_position(None, p), p);
        assert_eq!(set.world_position(Some(StructureId(99)), p), p);
        assert_eq!(set.world_facing(Some(StructureId(99)), Direction::West), Direction::West);
    }

    #[test]
    fn test_world_aabb_translates() {
        let mut set = StructureSet::new();
        set.upsert(Structure {
            id: StructureId(1),
            transform: StructureTransform::new(DVec3::new(10.0, 0.0, 0.0), DQuat::IDENTITY),
            bounds: Aabb::new(DVec3::ZERO, DVec3::splat(20.0)),
        });
        let local = Aabb::of_block(BlockPos::new(0, 0, 0));
        let world = set.world_aabb(Some(StructureId(1)), &local);
        assert_eq!(world.min, DVec3::new(10.0, 0.0, 0.0));
        assert_eq!(world.max, DVec3::new(11.0, 1.0, 1.0));
        assert_eq!(set.find_containing(DVec3::splat(5.0)), Some(StructureId(1)));
        assert_eq!(set.find_containing(DVec3::splat(25.0)), None);
    }

    #[test]
    fn test_aabb_extended_and_intersects() {
        let b = Aabb::of_block(BlockPos::new(4, 0, 0)).extended(Direction::East, 1.0);
        assert_eq!(b.max.x, 6.0);
        let w = Aabb::of_block(BlockPos::new(6, 0, 0)).extended(Direction::West, 1.0);
        assert_eq!(w.min.x, 5.0);
        assert!(b.intersects(&w));
        let far = Aabb::of_block(BlockPos::new(9, 0, 0));
        assert!(!b.intersects(&far));
    }

    #[test]
    fn test_chest_half_rotation() {
        assert_eq!(Direction::South.clockwise(), Direction::West);
        assert_eq!(Direction::North.clockwise(), Direction::East);
        assert_eq!(Direction::East.counter_clockwise(), Direction::North);
        assert_eq!(Direction::Up.clockwise(), Direction::Up);
    }

    #[test]
    fn test_neighbors_stop_at_grid_edge() {
        let edge = BlockPos::new(i32::MAX, 0, i32::MIN);
        let dirs: Vec<Direction> = edge.neighbors().map(|(d, _)| d).collect();
        assert_eq!(
            dirs,
            vec![Direction::West, Direction::Up, Direction::Down, Direction::South]
        );
        assert_eq!(edge.checked_offset(Direction::East), None);
        assert_eq!(edge.offset(Direction::East).x, i32::MIN);
        assert_eq!(BlockPos::new(0, 0, 0).neighbors().count(), 6);
    }

    #[test]
    fn test_primary_key_orders_x_then_z_then_y() {
        let a = BlockPos::new(0, 5, 1);
        let b = BlockPos::new(0, 0, 2);
        assert!(a.primary_key() < b.primary_key());
    }
}
