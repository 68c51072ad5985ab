//! Read/write network saves from disk.

use crate::config::ShiplinkConfig;
use crate::containers::ValidationReport;
use crate::network::Network;
use crate::schema::{self, SavedNetwork};
use crate::world::BlockSource;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const SAVE_DIR: &str = "shiplink";
const SAVE_FILE: &str = "network.json";

/// Get the save directory inside a world directory.
pub fn save_dir(world_dir: &Path) -> PathBuf {
    world_dir.join(SAVE_DIR)
}

/// Get the path to the network save file inside a world directory.
pub fn save_file(world_dir: &Path) -> PathBuf {
    save_dir(world_dir).join(SAVE_FILE)
}

/// Check if a network save exists for the given world directory.
pub fn exists(world_dir: &Path) -> bool {
    save_file(world_dir).exists()
}

/// Read the raw save without rebuilding a network.
pub fn load_saved(world_dir: &Path) -> Result<SavedNetwork> {
    let path = save_file(world_dir);
    let json = fs::read_to_string(&path)
        .with_context(|| format!("failed to read network save from {}", path.display()))?;
    schema::from_json(&json).with_context(|| format!("invalid network save {}", path.display()))
}

/// Load a network and re-validate it against `world`.
pub fn load(
    world_dir: &Path,
    config: ShiplinkConfig,
    world: &dyn BlockSource,
) -> Result<(Network, ValidationReport)> {
    let saved = load_saved(world_dir)?;
    Ok(Network::from_saved(config, &saved, world))
}

/// Save a network, creating the save directory if needed. Clears the dirty
/// flag on success.
pub fn save(world_dir: &Path, network: &mut Network) -> Result<()> {
    let dir = save_dir(world_dir);
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create save directory {}", dir.display()))?;

    let path = save_file(world_dir);
    let json = schema::to_json(&network.to_saved())?;
    fs::write(&path, json)
        .with_context(|| format!("failed to write network save to {}", path.display()))?;

    network.clear_dirty();
    tracing::debug!("saved network to {}", path.display());
    Ok(())
}
