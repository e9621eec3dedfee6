//! Integration tests for node configuration persistence and the
//! scan-rate/config-save-rate clamping rules (spec §6).

use sparkplug_edge_node::config::{
    clamp_or_default, NodeConfig, RecreateNodeArgs, DEFAULT_CONFIG_SAVE_RATE_MS,
    DEFAULT_SCAN_RATE_MS, MAX_CONFIG_SAVE_RATE_MS, MAX_SCAN_RATE_MS, MIN_CONFIG_SAVE_RATE_MS,
    MIN_SCAN_RATE_MS,
};
use tempfile::tempdir;

#[test]
fn scan_rate_out_of_range_is_replaced_with_default() {
    assert_eq!(
        clamp_or_default(400, MIN_SCAN_RATE_MS, MAX_SCAN_RATE_MS, DEFAULT_SCAN_RATE_MS),
        DEFAULT_SCAN_RATE_MS
    );
    assert_eq!(
        clamp_or_default(4_000_000, MIN_SCAN_RATE_MS, MAX_SCAN_RATE_MS, DEFAULT_SCAN_RATE_MS),
        DEFAULT_SCAN_RATE_MS
    );
}

#[test]
fn scan_rate_within_range_passes_through_unchanged() {
    assert_eq!(
        clamp_or_default(2_000, MIN_SCAN_RATE_MS, MAX_SCAN_RATE_MS, DEFAULT_SCAN_RATE_MS),
        2_000
    );
    assert_eq!(
        clamp_or_default(MIN_SCAN_RATE_MS, MIN_SCAN_RATE_MS, MAX_SCAN_RATE_MS, DEFAULT_SCAN_RATE_MS),
        MIN_SCAN_RATE_MS
    );
    assert_eq!(
        clamp_or_default(MAX_SCAN_RATE_MS, MIN_SCAN_RATE_MS, MAX_SCAN_RATE_MS, DEFAULT_SCAN_RATE_MS),
        MAX_SCAN_RATE_MS
    );
}

#[test]
fn config_save_rate_out_of_range_is_replaced_with_default() {
    assert_eq!(
        clamp_or_default(
            10_000,
            MIN_CONFIG_SAVE_RATE_MS,
            MAX_CONFIG_SAVE_RATE_MS,
            DEFAULT_CONFIG_SAVE_RATE_MS
        ),
        DEFAULT_CONFIG_SAVE_RATE_MS
    );
}

#[test]
fn node_config_missing_file_loads_as_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("node_config.json");
    assert_eq!(NodeConfig::load(&path).unwrap(), None);
}

#[test]
fn node_config_save_then_load_round_trips_bd_seq_and_recreate_args() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("node_config.json");
    let config = NodeConfig {
        bd_seq: 42,
        recreate_node_args: RecreateNodeArgs {
            scan_rate: 1_500,
            config_save_rate: 900_000,
        },
    };
    config.save(&path).unwrap();

    let loaded = NodeConfig::load(&path).unwrap().unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn node_config_save_creates_missing_parent_directories() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("state").join("node");
    let path = nested.join("node_config.json");
    let config = NodeConfig {
        bd_seq: 0,
        recreate_node_args: RecreateNodeArgs {
            scan_rate: DEFAULT_SCAN_RATE_MS,
            config_save_rate: DEFAULT_CONFIG_SAVE_RATE_MS,
        },
    };
    config.save(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn node_config_json_shape_matches_external_interface() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("node_config.json");
    let config = NodeConfig {
        bd_seq: 7,
        recreate_node_args: RecreateNodeArgs {
            scan_rate: 1_000,
            config_save_rate: 600_000,
        },
    };
    config.save(&path).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["bdSeq"], 7);
    assert_eq!(raw["recreate_node_args"]["scan_rate"], 1_000);
    assert_eq!(raw["recreate_node_args"]["config_save_rate"], 600_000);
}
