//! Deferred node registrations.
//!
//! A placement event may arrive before the host can answer questions about
//! the cell. Instead of waiting, the event is queued and retried once per
//! tick until the cell is loaded or the attempt limit is reached.

use crate::connectivity::Placement;
use crate::geometry::{BlockPos, Direction, StructureId};
use crate::network::Network;
use crate::world::BlockSource;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRegistration {
    pub pos: BlockPos,
    pub structure: Option<StructureId>,
    pub facing: Direction,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    entries: VecDeque<PendingRegistration>,
}

impl PendingQueue {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn contains(&self, pos: BlockPos) -> bool {
        self.entries.iter().any(|e| e.pos == pos)
    }
}

/// Result of one pass over the pending queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingPass {
    pub registered: Vec<(BlockPos, Placement)>,
    pub rejected: Vec<BlockPos>,
    pub dropped: Vec<BlockPos>,
    pub waiting: usize,
}

impl Network {
    /// Queue a node placement to be registered on a later tick.
    pub fn queue_node_placement(
        &mut self,
        pos: BlockPos,
        structure: Option<StructureId>,
        facing: Direction,
    ) {
        if self.pending.contains(pos) {
            return;
        }
        self.pending.entries.push_back(PendingRegistration {
            pos,
            structure,
            facing,
            attempts: 0,
        });
    }

    /// Forget a queued placement (the node vanished before registering).
    pub fn cancel_pending(&mut self, pos: BlockPos) -> bool {
        let before = self.pending.entries.len();
        self.pending.entries.retain(|e| e.pos != pos);
        before != self.pending.entries.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Retry every queued placement once. Never blocks.
    pub fn process_pending(&mut self, world: &dyn BlockSource) -> PendingPass {
        let max_attempts = self.config.registration.max_attempts;
        let mut pass = PendingPass::default();
        let entries = std::mem::take(&mut self.pending.entries);

        for mut entry in entries {
            if world.is_loaded(entry.pos) {
                match self.on_node_placed(world, entry.pos, entry.structure, entry.facing) {
                    Ok(placement) => pass.registered.push((entry.pos, placement)),
                    Err(e) => {
                        tracing::warn!("deferred registration at {} rejected: {}", entry.pos, e);
                        pass.rejected.push(entry.pos);
                    }
                }
                continue;
            }
            entry.attempts += 1;
            if entry.attempts >= max_attempts {
                tracing::warn!(
                    "dropping registration at {} after {} attempts",
                    entry.pos,
                    entry.attempts
                );
                pass.dropped.push(entry.pos);
            } else {
                self.pending.entries.push_back(entry);
            }
        }

        pass.waiting = self.pending.len();
        pass
    }
}
