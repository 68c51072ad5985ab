//! Item transport between storage containers across independently moving
//! structures.
//!
//! Provides the network model ([`network::Network`]) with incremental node
//! grouping, double-container storage groups, the cross-structure transfer
//! scheduler, JSON persistence and a per-world registry.

pub mod config;
pub mod connectivity;
pub mod containers;
pub mod geometry;
pub mod memory;
pub mod network;
pub mod pending;
pub mod registry;
pub mod schema;
pub mod storage;
pub mod transfer;
pub mod world;

pub use config::ShiplinkConfig;
pub use connectivity::{Placement, Removal};
pub use containers::{ContainerRemoval, ValidationReport};
pub use geometry::{Aabb, BlockPos, Direction, Structure, StructureId, StructureSet, StructureTransform};
pub use network::{GroupId, Mode, Network, NetworkError, StructureInfo};
pub use registry::{WorldId, WorldRegistry};
pub use transfer::{TransferRecord, TransferReport};
pub use world::{BlockSource, ChestHalf, ContainerState, ItemBatch, ItemStore, ItemStores};
