//! Configuration for transfer scheduling and node registration.
//!
//! Load order: `shiplink.toml` → environment variables → defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const CONFIG_FILE: &str = "shiplink.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiplinkConfig {
    pub transfer: TransferConfig,
    pub registration: RegistrationConfig,
}

/// Transfer scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Items per node per scheduling interval.
    pub base_rate: u32,
    /// Maximum distance between two group centers for a transfer.
    pub max_distance: f64,
    /// Scheduler ticks between transfer runs (50 ticks = 2.5s at 20 TPS).
    pub interval_ticks: u32,
    /// A pair never moves more than `base_rate * max_quota_multiplier` per run.
    pub max_quota_multiplier: u32,
    /// Raise any non-zero, sub-base-rate quota up to one full base-rate unit.
    /// When off, poorly aligned pairs move proportionally less.
    pub minimum_floor: bool,
}

/// Deferred node registration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Ticks a pending registration is retried before it is dropped.
    pub max_attempts: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            base_rate: 4,
            max_distance: 50.0,
            interval_ticks: 50,
            max_quota_multiplier: 10,
            minimum_floor: true,
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self { max_attempts: 100 }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl ShiplinkConfig {
    /// Load config from `shiplink.toml` in `root`, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("failed to parse {}", config_path.display()))?
        } else {
            Self::default()
        };

        env_override("SHIPLINK_BASE_RATE", &mut config.transfer.base_rate);
        env_override("SHIPLINK_MAX_DISTANCE", &mut config.transfer.max_distance);
        env_override("SHIPLINK_INTERVAL_TICKS", &mut config.transfer.interval_ticks);
        env_override("SHIPLINK_MINIMUM_FLOOR", &mut config.transfer.minimum_floor);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.transfer;
        if t.base_rate == 0 {
            anyhow::bail!("transfer.base_rate must be at least 1");
        }
        if t.interval_ticks == 0 {
            anyhow::bail!("transfer.interval_ticks must be at least 1");
        }
        if t.max_quota_multiplier == 0 {
            anyhow::bail!("transfer.max_quota_multiplier must be at least 1");
        }
        if t.max_distance.is_nan() || t.max_distance <= 0.0 {
            anyhow::bail!(
                "transfer.max_distance ({}) must be positive",
                t.max_distance
            );
        }
        Ok(())
    }
}
