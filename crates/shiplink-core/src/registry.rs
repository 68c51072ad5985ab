//! One network per loaded world.

use crate::config::ShiplinkConfig;
use crate::network::Network;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Host-assigned identifier of a world or dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(pub String);

impl WorldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owns the network of every loaded world. Worlds share nothing.
#[derive(Debug, Default)]
pub struct WorldRegistry {
    config: ShiplinkConfig,
    worlds: HashMap<WorldId, Network>,
}

impl WorldRegistry {
    pub fn new(config: ShiplinkConfig) -> Self {
        Self {
            config,
            worlds: HashMap::new(),
        }
    }

    pub fn get_or_create(&mut self, id: &WorldId) -> &mut Network {
        let config = &self.config;
        self.worlds.entry(id.clone()).or_insert_with(|| {
            tracing::debug!("created network for world {}", id);
            Network::new(config.clone())
        })
    }

    /// Install a network restored from disk, replacing any existing one.
    pub fn insert(&mut self, id: WorldId, network: Network) -> Option<Network> {
        self.worlds.insert(id, network)
    }

    pub fn get(&self, id: &WorldId) -> Option<&Network> {
        self.worlds.get(id)
    }

    pub fn get_mut(&mut self, id: &WorldId) -> Option<&mut Network> {
        self.worlds.get_mut(id)
    }

    /// Tear down a world's network, handing it back for a final save.
    pub fn unload(&mut self, id: &WorldId) -> Option<Network> {
        let network = self.worlds.remove(id);
        if network.is_some() {
            tracing::info!("unloaded network for world {}", id);
        }
        network
    }

    pub fn world_ids(&self) -> Vec<WorldId> {
        let mut ids: Vec<WorldId> = self.worlds.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }
}
