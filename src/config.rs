//! Node configuration persistence: `bdSeq` and re-creation arguments
//! (scan rate, config-save rate), durable across restarts.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default scan interval, milliseconds.
pub const DEFAULT_SCAN_RATE_MS: u64 = 1_000;
/// Minimum accepted scan interval, milliseconds.
pub const MIN_SCAN_RATE_MS: u64 = 500;
/// Maximum accepted scan interval, milliseconds.
pub const MAX_SCAN_RATE_MS: u64 = 3_600_000;

/// Default config-save interval, milliseconds.
pub const DEFAULT_CONFIG_SAVE_RATE_MS: u64 = 600_000;
/// Minimum accepted config-save interval, milliseconds.
pub const MIN_CONFIG_SAVE_RATE_MS: u64 = 20_000;
/// Maximum accepted config-save interval, milliseconds.
pub const MAX_CONFIG_SAVE_RATE_MS: u64 = 36_000_000;

/// Clamps `value` into `[min, max]`, substituting `default` if `value`
/// falls outside the range — matching the construction-time clamping
/// rule in spec §6 (values out of range are replaced, not clamped to
/// the nearer bound).
pub fn clamp_or_default(value: u64, min: u64, max: u64, default: u64) -> u64 {
    if (min..=max).contains(&value) {
        value
    } else {
        default
    }
}

/// Re-creation arguments needed to rebuild scan/save timers after a
/// restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecreateNodeArgs {
    /// Scan interval, milliseconds.
    pub scan_rate: u64,
    /// Config-save interval, milliseconds.
    pub config_save_rate: u64,
}

/// The persisted node-configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// The `bdSeq` value in effect when this file was last written.
    #[serde(rename = "bdSeq")]
    pub bd_seq: u32,
    /// Timer re-creation arguments.
    pub recreate_node_args: RecreateNodeArgs,
}

impl NodeConfig {
    /// Reads and parses the node config file, returning `None` if it
    /// does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Serializes and atomically rewrites the node config file,
    /// creating missing parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let serialized = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, serialized)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}
