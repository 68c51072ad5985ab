//! Cross-structure item transfer scheduling.
//!
//! A run snapshots every group in world space, pairs opposed export/import
//! groups whose reach volumes touch across a structure boundary, scores how
//! well they line up, and moves items between their linked containers.
//!
//! Pair evaluation runs in parallel. Item movement is applied sequentially in
//! (exporter, importer) order so no container is withdrawn from twice at once.

use crate::config::TransferConfig;
use crate::geometry::{Aabb, Axis, BlockPos, Direction, StructureId, StructureSet};
use crate::network::{Group, GroupId, Mode, Network};
use crate::world::{BlockSource, ItemBatch, ItemStores};
use glam::DVec3;
use rayon::prelude::*;
use serde::Serialize;

/// World-space view of one group, rebuilt every run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSnapshot {
    pub group: GroupId,
    pub mode: Mode,
    pub structure: Option<StructureId>,
    pub facing: Direction,
    pub reach: Aabb,
    pub center: DVec3,
    pub node_count: usize,
    pub containers: Vec<BlockPos>,
}

impl TransferSnapshot {
    /// Snapshot `group` under the current structure transforms. `None` for an
    /// empty group. A structure that no longer resolves counts as grounded.
    pub fn build(group: &Group, containers: Vec<BlockPos>, structures: &StructureSet) -> Option<Self> {
        let local = Aabb::covering(group.members().iter().copied())?.extended(group.facing, 1.0);
        Some(Self {
            group: group.id,
            mode: group.mode,
            structure: structures.resolve(group.structure),
            facing: structures.world_facing(group.structure, group.facing),
            reach: structures.world_aabb(group.structure, &local),
            center: structures.world_position(group.structure, local.center()),
            node_count: group.len(),
            containers,
        })
    }
}

/// Why a pair of groups does not trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    TooFar,
    SameStructure,
    SameMode,
    NoOverlap,
    NotOpposed,
    Misaligned,
    NoContainers,
}

/// A pair that passed every check, with its quota for this run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTransfer {
    pub exporter: GroupId,
    pub importer: GroupId,
    pub alignment: f64,
    pub quota: u32,
    exporter_containers: Vec<BlockPos>,
    importer_containers: Vec<BlockPos>,
}

/// Outcome of one executed pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRecord {
    pub exporter: GroupId,
    pub importer: GroupId,
    pub alignment: f64,
    pub quota: u32,
    pub moved: u32,
}

/// Outcome of one scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferReport {
    pub groups: usize,
    pub pairs_considered: usize,
    pub records: Vec<TransferRecord>,
}

impl TransferReport {
    pub fn total_moved(&self) -> u64 {
        self.records.iter().map(|r| u64::from(r.moved)).sum()
    }
}

/// Percentage in `[0, 100]` of the smaller cross-section that overlaps the
/// other, measured perpendicular to `facing`.
pub fn alignment(exporter: &Aabb, importer: &Aabb, facing: Direction) -> f64 {
    let axis = facing.axis();
    let pct = if facing.is_horizontal() {
        let overlap = exporter.overlap_on(importer, Axis::Y);
        let height = exporter.size().y.min(importer.size().y);
        if overlap <= 0.0 || height <= 0.0 {
            return 0.0;
        }
        overlap / height * 100.0
    } else {
        let (a, b) = axis.others();
        let overlap_a = exporter.overlap_on(importer, a);
        let overlap_b = exporter.overlap_on(importer, b);
        let footprint = |bx: &Aabb| a.of(bx.size()) * b.of(bx.size());
        let area = footprint(exporter).min(footprint(importer));
        if overlap_a <= 0.0 || overlap_b <= 0.0 || area <= 0.0 {
            return 0.0;
        }
        overlap_a * overlap_b / area * 100.0
    };
    pct.clamp(0.0, 100.0)
}

/// Items a pair may move this run.
pub fn quota(exporter_nodes: usize, importer_nodes: usize, alignment: f64, config: &TransferConfig) -> u32 {
    if alignment <= 0.0 {
        return 0;
    }
    let base = u64::from(config.base_rate);
    let cap = base * u64::from(config.max_quota_multiplier);
    let nodes = exporter_nodes.min(importer_nodes) as u64;
    let full = nodes.saturating_mul(base);
    let mut actual = (full as f64 * alignment / 100.0).floor() as u64;
    if config.minimum_floor && actual < base {
        actual = base;
    }
    actual.min(cap) as u32
}

/// Run every eligibility check on an unordered pair, in order.
pub fn evaluate_pair(
    a: &TransferSnapshot,
    b: &TransferSnapshot,
    config: &TransferConfig,
) -> Result<PlannedTransfer, Rejection> {
    if a.center.distance(b.center) > config.max_distance {
        return Err(Rejection::TooFar);
    }
    if a.structure == b.structure {
        return Err(Rejection::SameStructure);
    }
    let (exporter, importer) = match (a.mode, b.mode) {
        (Mode::Export, Mode::Import) => (a, b),
        (Mode::Import, Mode::Export) => (b, a),
        _ => return Err(Rejection::SameMode),
    };
    if !a.reach.intersects(&b.reach) {
        return Err(Rejection::NoOverlap);
    }
    if a.facing.opposite() != b.facing {
        return Err(Rejection::NotOpposed);
    }
    if exporter.containers.is_empty() || importer.containers.is_empty() {
        return Err(Rejection::NoContainers);
    }

    let alignment = alignment(&exporter.reach, &importer.reach, exporter.facing);
    let quota = quota(exporter.node_count, importer.node_count, alignment, config);
    if quota == 0 {
        return Err(Rejection::Misaligned);
    }

    Ok(PlannedTransfer {
        exporter: exporter.group,
        importer: importer.group,
        alignment,
        quota,
        exporter_containers: exporter.containers.clone(),
        importer_containers: importer.containers.clone(),
    })
}

/// Offer `batch` to the importer containers slot by slot; returns what was
/// left over.
fn insert_first_fit(
    stores: &mut dyn ItemStores,
    targets: &[BlockPos],
    mut batch: ItemBatch,
    simulate: bool,
) -> ItemBatch {
    for &target in targets {
        let Some(store) = stores.store_mut(target) else {
            continue;
        };
        for slot in 0..store.slot_count() {
            if batch.is_empty() {
                return batch;
            }
            batch = store.insert(slot, batch, simulate);
        }
    }
    batch
}

impl PlannedTransfer {
    /// Move up to `quota` items. Never creates or destroys items.
    pub fn execute(&self, stores: &mut dyn ItemStores) -> u32 {
        let mut remaining = self.quota;
        let mut moved = 0;
        let targets: Vec<BlockPos> = self
            .importer_containers
            .iter()
            .copied()
            .filter(|p| !self.exporter_containers.contains(p))
            .collect();

        for &source in &self.exporter_containers {
            let slots = match stores.store_mut(source) {
                Some(store) => store.slot_count(),
                None => continue,
            };
            for slot in 0..slots {
                if remaining == 0 {
                    return moved;
                }
                let Some(offered) = stores
                    .store_mut(source)
                    .map(|s| s.extract(slot, remaining, true))
                else {
                    break;
                };
                if offered.is_empty() {
                    continue;
                }
                let rejected = insert_first_fit(stores, &targets, offered.clone(), true);
                let accepted = offered.count.saturating_sub(rejected.count);
                if accepted == 0 {
                    continue;
                }

                let Some(taken) = stores
                    .store_mut(source)
                    .map(|s| s.extract(slot, accepted, false))
                else {
                    break;
                };
                let leftover = insert_first_fit(stores, &targets, taken.clone(), false);
                if !leftover.is_empty()
                    && let Some(store) = stores.store_mut(source)
                {
                    let lost = store.insert(slot, leftover.clone(), false);
                    if !lost.is_empty() {
                        tracing::warn!(
                            "could not return {} x{} to {}",
                            lost.item,
                            lost.count,
                            source
                        );
                    }
                }
                let delivered = taken.count.saturating_sub(leftover.count);
                moved += delivered;
                remaining = remaining.saturating_sub(delivered);
            }
        }
        moved
    }
}

impl Network {
    /// World-space snapshots of every non-empty group, in id order.
    pub fn snapshots(&self, structures: &StructureSet) -> Vec<TransferSnapshot> {
        self.groups()
            .filter_map(|g| TransferSnapshot::build(g, self.linked_containers(g.id), structures))
            .collect()
    }

    /// Evaluate every pair and execute the eligible ones.
    pub fn run_transfers(&mut self, stores: &mut dyn ItemStores, structures: &StructureSet) -> TransferReport {
        let snapshots = self.snapshots(structures);
        let config = &self.config.transfer;

        let pairs: Vec<(usize, usize)> = (0..snapshots.len())
            .flat_map(|i| (i + 1..snapshots.len()).map(move |j| (i, j)))
            .collect();

        let mut planned: Vec<PlannedTransfer> = pairs
            .par_iter()
            .filter_map(|&(i, j)| evaluate_pair(&snapshots[i], &snapshots[j], config).ok())
            .collect();
        planned.sort_by_key(|p| (p.exporter, p.importer));

        let mut report = TransferReport {
            groups: snapshots.len(),
            pairs_considered: pairs.len(),
            records: Vec::with_capacity(planned.len()),
        };
        for plan in planned {
            let moved = plan.execute(stores);
            tracing::debug!(
                "{} -> {}: alignment {:.1}%, quota {}, moved {}",
                plan.exporter,
                plan.importer,
                plan.alignment,
                plan.quota,
                moved
            );
            report.records.push(TransferRecord {
                exporter: plan.exporter,
                importer: plan.importer,
                alignment: plan.alignment,
                quota: plan.quota,
                moved,
            });
        }

        tracing::info!(
            "transfer run: {} groups, {} pairs, {} active, {} items moved",
            report.groups,
            report.pairs_considered,
            report.records.len(),
            report.total_moved()
        );
        report
    }

    /// Advance one scheduling tick: retry pending registrations, then run
    /// transfers when the interval has elapsed.
    pub fn tick<W: BlockSource + ItemStores>(
        &mut self,
        world: &mut W,
        structures: &StructureSet,
    ) -> Option<TransferReport> {
        if !self.pending.is_empty() {
            let pass = self.process_pending(&*world);
            if !pass.registered.is_empty() || !pass.dropped.is_empty() {
                tracing::debug!(
                    "pending pass: {} registered, {} dropped, {} waiting",
                    pass.registered.len(),
                    pass.dropped.len(),
                    pass.waiting
                );
            }
        }

        self.ticks_since_run += 1;
        if self.ticks_since_run < self.config.transfer.interval_ticks {
            return None;
        }
        self.ticks_since_run = 0;
        Some(self.run_transfers(world, structures))
    }
}
