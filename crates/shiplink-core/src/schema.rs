//! Persisted tag tree of a network and its version handling.
//!
//! Keys follow the host's save format (`Groups`, `StorageGroups`, ...).
//! Unknown keys are ignored and every optional key has a default, so older
//! and newer saves of the same version load cleanly.

use crate::config::ShiplinkConfig;
use crate::containers::ValidationReport;
use crate::geometry::{BlockPos, Direction, StructureId};
use crate::network::{GroupId, Mode, Network, primary_of_set};
use crate::world::BlockSource;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

pub const CURRENT_VERSION: u32 = 1;

fn current_version() -> u32 {
    CURRENT_VERSION
}

fn default_import() -> bool {
    true
}

/// Read a field, keeping its default when the stored value has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::warn!("ignoring malformed save field: {}", e);
        T::default()
    }))
}

fn lenient_import<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_bool().unwrap_or_else(|| {
        tracing::warn!("ignoring malformed ImportMode {}, using import", value);
        default_import()
    }))
}

fn lenient_version<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or_else(|| {
            tracing::warn!("ignoring malformed Version {}", value);
            CURRENT_VERSION
        }))
}

/// Read a list, dropping entries that do not parse.
fn lenient_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        tracing::warn!("ignoring save field that is not a list");
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("dropping malformed save entry: {}", e);
                None
            }
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedNetwork {
    #[serde(rename = "Version", default = "current_version", deserialize_with = "lenient_version")]
    pub version: u32,
    #[serde(
        rename = "SavedAt",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(rename = "Groups", default, deserialize_with = "lenient_list")]
    pub groups: Vec<SavedGroup>,
    #[serde(rename = "StorageGroups", default, deserialize_with = "lenient_list")]
    pub storage_groups: Vec<SavedStorageGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedGroup {
    #[serde(rename = "Id")]
    pub id: GroupId,
    #[serde(rename = "ImportMode", default = "default_import", deserialize_with = "lenient_import")]
    pub import_mode: bool,
    #[serde(rename = "Blocks", default, deserialize_with = "lenient_list")]
    pub blocks: Vec<BlockPos>,
    #[serde(rename = "OnStructure", default, deserialize_with = "lenient")]
    pub on_structure: bool,
    #[serde(
        rename = "StructureId",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub structure_id: Option<StructureId>,
    #[serde(
        rename = "Facing",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub facing: Option<Direction>,
}

impl SavedGroup {
    pub fn mode(&self) -> Mode {
        if self.import_mode { Mode::Import } else { Mode::Export }
    }

    /// Structure reference, `None` unless both the flag and the id are set.
    pub fn structure(&self) -> Option<StructureId> {
        self.on_structure.then_some(self.structure_id).flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedStorageGroup {
    #[serde(rename = "Primary")]
    pub primary: BlockPos,
    #[serde(rename = "Members", default, deserialize_with = "lenient_list")]
    pub members: Vec<BlockPos>,
    #[serde(rename = "LinkedGroups", default, deserialize_with = "lenient_list")]
    pub linked_groups: Vec<GroupId>,
}

/// Reject saves written by an incompatible format version.
pub fn validate_version(saved: &SavedNetwork) -> Result<()> {
    if saved.version != CURRENT_VERSION {
        anyhow::bail!(
            "network save version mismatch: expected {}, found {}",
            CURRENT_VERSION,
            saved.version
        );
    }
    Ok(())
}

/// Serialize a save to a pretty-printed JSON string.
pub fn to_json(saved: &SavedNetwork) -> Result<String> {
    serde_json::to_string_pretty(saved).context("failed to serialize network to JSON")
}

/// Deserialize a save from a JSON string.
pub fn from_json(json: &str) -> Result<SavedNetwork> {
    let saved: SavedNetwork =
        serde_json::from_str(json).context("failed to deserialize network from JSON")?;
    validate_version(&saved)?;
    Ok(saved)
}

impl Network {
    /// Capture every group and storage group, stamped with the current time.
    pub fn to_saved(&self) -> SavedNetwork {
        let groups = self
            .groups()
            .map(|g| SavedGroup {
                id: g.id,
                import_mode: g.mode.is_import(),
                blocks: g.members().iter().copied().collect(),
                on_structure: g.structure.is_some(),
                structure_id: g.structure,
                facing: Some(g.facing),
            })
            .collect();
        let storage_groups = self
            .storage_groups()
            .map(|sg| SavedStorageGroup {
                primary: sg.primary,
                members: sg.members().iter().copied().collect(),
                linked_groups: sg.linked().iter().copied().collect(),
            })
            .collect();
        SavedNetwork {
            version: CURRENT_VERSION,
            saved_at: Some(Utc::now()),
            groups,
            storage_groups,
        }
    }

    /// Rebuild a network from a save, then re-validate it against `world`.
    pub fn from_saved(
        config: ShiplinkConfig,
        saved: &SavedNetwork,
        world: &dyn BlockSource,
    ) -> (Self, ValidationReport) {
        let mut net = Network::new(config);

        for group in &saved.groups {
            if net.group(group.id).is_some() {
                tracing::warn!("skipping duplicate saved {}", group.id);
                continue;
            }
            let facing = group
                .facing
                .or_else(|| group.blocks.iter().find_map(|p| world.node_facing(*p)))
                .unwrap_or(Direction::Up);
            net.install_group(group.id, group.mode(), facing, group.structure());
            for pos in &group.blocks {
                if net.group_of(*pos).is_some() {
                    tracing::warn!("{} claimed by two saved groups, keeping the first", pos);
                    continue;
                }
                net.add_node(group.id, *pos);
            }
            if net.member_count(group.id) == 0 {
                net.remove_group(group.id);
            }
        }

        for sg in &saved.storage_groups {
            let members: BTreeSet<BlockPos> = sg
                .members
                .iter()
                .chain(std::iter::once(&sg.primary))
                .copied()
                .filter(|p| net.storage_group_of(*p).is_none())
                .collect();
            let Some(primary) = primary_of_set(&members) else {
                continue;
            };
            net.insert_storage_group(primary, members);
            for id in &sg.linked_groups {
                if !net.link(primary, *id) {
                    tracing::debug!("dropping saved link from {} to missing {}", primary, id);
                }
            }
        }

        let report = net.validate_all_connections(world);
        tracing::info!(
            "loaded {} groups and {} storage groups",
            net.group_ids().len(),
            net.storage_groups().count()
        );
        net.clear_dirty();
        net.take_dirty_groups();
        (net, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_take_defaults() {
        let json = r#"{
            "Groups": [{"Id": 7, "Blocks": [{"x": 1, "y": 2, "z": 3}], "Extra": "ignored"}],
            "Unknown": 42
        }"#;
        let saved = from_json(json).unwrap();
        assert_eq!(saved.version, CURRENT_VERSION);
        assert_eq!(saved.groups.len(), 1);
        let g = &saved.groups[0];
        assert_eq!(g.mode(), Mode::Import);
        assert_eq!(g.structure(), None);
        assert_eq!(g.facing, None);
        assert!(saved.storage_groups.is_empty());
    }

    #[test]
    fn test_structure_requires_flag() {
        let json = r#"{"Groups": [{"Id": 1, "OnStructure": false, "StructureId": 5}]}"#;
        let saved = from_json(json).unwrap();
        assert_eq!(saved.groups[0].structure(), None);
    }

    #[test]
    fn test_malformed_fields_fall_back_to_defaults() {
        let json = r#"{
            "SavedAt": 12,
            "Groups": [
                {"Id": 1, "ImportMode": "yes", "OnStructure": "no", "Facing": "sideways",
                 "Blocks": [{"x": 0, "y": 0, "z": 0}, "junk"]},
                {"Id": "two", "Blocks": []}
            ],
            "StorageGroups": [
                {"Primary": {"x": 1, "y": 0, "z": 0}, "Members": 7, "LinkedGroups": [1, "x"]}
            ]
        }"#;
        let saved = from_json(json).unwrap();
        assert_eq!(saved.saved_at, None);
        assert_eq!(saved.groups.len(), 1);
        let g = &saved.groups[0];
        assert_eq!(g.id, GroupId(1));
        assert_eq!(g.mode(), Mode::Import);
        assert!(!g.on_structure);
        assert_eq!(g.facing, None);
        assert_eq!(g.blocks, vec![BlockPos::new(0, 0, 0)]);
        assert!(saved.storage_groups[0].members.is_empty());
        assert_eq!(saved.storage_groups[0].linked_groups, vec![GroupId(1)]);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let err = from_json(r#"{"Version": 99}"#).unwrap_err();
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_malformed_json_has_context() {
        let err = from_json("{not json").unwrap_err();
        assert!(err.to_string().contains("failed to deserialize"));
    }
}
