//! Integration tests for memory tags: write coercion/validation and the
//! JSON persistence round-trip (component C3, spec §4.3 and scenario S6).

use sparkplug_edge_node::datatype::{Datatype, RawValue, Value};
use sparkplug_edge_node::memory_tag::{MemoryTag, MemoryTagConfig};
use sparkplug_edge_node::metric::Tag;
use tempfile::tempdir;

fn writable_string_tag(path: &std::path::Path, persistent: bool) -> MemoryTag {
    MemoryTag::new(
        MemoryTagConfig {
            name: "greeting".into(),
            alias: 0,
            datatype: Datatype::String,
            disable_alias: false,
            rbe_ignore: false,
            writable: true,
            initial_value: Value::Text("hi".into()),
            persistent,
            persistence_path: Some(path.to_path_buf()),
        },
        None,
    )
    .unwrap()
}

#[test]
fn s3_ncmd_write_replaces_slot_value_through_the_tag_trait() {
    let dir = tempdir().unwrap();
    let mut tag = writable_string_tag(&dir.path().join("tags.json"), false);

    assert!(tag.write(&RawValue::Text("hello".into())));
    assert!(tag.read(1));
    assert_eq!(tag.slot_value(), Value::Text("hello".into()));
}

#[test]
fn non_writable_tag_rejects_writes() {
    let dir = tempdir().unwrap();
    let mut tag = MemoryTag::new(
        MemoryTagConfig {
            name: "sensor".into(),
            alias: 0,
            datatype: Datatype::Int64,
            disable_alias: false,
            rbe_ignore: false,
            writable: false,
            initial_value: Value::Int(0),
            persistent: false,
            persistence_path: Some(dir.path().join("tags.json")),
        },
        None,
    )
    .unwrap();

    assert!(!tag.write(&RawValue::Int(5)));
    assert_eq!(tag.slot_value(), Value::Int(0));
}

#[test]
fn write_validator_rejecting_a_lower_value_leaves_slot_unchanged() {
    let dir = tempdir().unwrap();
    let validator = Box::new(|current: &Value, new: &Value| {
        matches!((current, new), (Value::Int(c), Value::Int(n)) if n >= c)
    });
    let mut tag = MemoryTag::new(
        MemoryTagConfig {
            name: "counter".into(),
            alias: 0,
            datatype: Datatype::Int64,
            disable_alias: false,
            rbe_ignore: false,
            writable: true,
            initial_value: Value::Int(10),
            persistent: false,
            persistence_path: Some(dir.path().join("tags.json")),
        },
        Some(validator),
    )
    .unwrap();

    assert!(!tag.write(&RawValue::Int(3)));
    assert_eq!(tag.slot_value(), Value::Int(10));
    assert!(tag.write(&RawValue::Int(11)));
    assert_eq!(tag.slot_value(), Value::Int(11));
}

#[test]
fn s6_persistence_round_trip_survives_reconstruction() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tags.json");

    let mut tag = MemoryTag::new(
        MemoryTagConfig {
            name: "counter".into(),
            alias: 0,
            datatype: Datatype::Int64,
            disable_alias: false,
            rbe_ignore: false,
            writable: true,
            initial_value: Value::Int(7),
            persistent: true,
            persistence_path: Some(path.clone()),
        },
        None,
    )
    .unwrap();

    assert!(tag.write(&RawValue::Int(99)));
    tag.save_to_disk().unwrap();

    // Simulate a restart: a freshly constructed tag with the same
    // `initial_value` of 7 must instead adopt the persisted 99.
    let restored = MemoryTag::new(
        MemoryTagConfig {
            name: "counter".into(),
            alias: 0,
            datatype: Datatype::Int64,
            disable_alias: false,
            rbe_ignore: false,
            writable: true,
            initial_value: Value::Int(7),
            persistent: true,
            persistence_path: Some(path),
        },
        None,
    )
    .unwrap();
    assert_eq!(restored.slot_value(), Value::Int(99));
}

#[test]
fn corrupt_persistence_file_logs_a_warning_and_keeps_the_initial_value() {
    let _ = env_logger::try_init();

    let dir = tempdir().unwrap();
    let path = dir.path().join("tags.json");
    std::fs::write(&path, b"not json").unwrap();

    let tag = MemoryTag::new(
        MemoryTagConfig {
            name: "counter".into(),
            alias: 0,
            datatype: Datatype::Int64,
            disable_alias: false,
            rbe_ignore: false,
            writable: true,
            initial_value: Value::Int(7),
            persistent: true,
            persistence_path: Some(path),
        },
        None,
    )
    .unwrap();
    assert_eq!(tag.slot_value(), Value::Int(7));
}

#[test]
fn persistence_file_holds_a_name_keyed_json_map() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tags.json");
    let mut tag = writable_string_tag(&path, true);
    assert!(tag.write(&RawValue::Text("hello".into())));
    tag.save_to_disk().unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["greeting"]["name"], "greeting");
    assert_eq!(raw["greeting"]["current_value"], "hello");
    assert_eq!(raw["greeting"]["writable"], true);
}
