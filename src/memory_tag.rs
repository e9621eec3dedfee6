//! Memory Tag: a [`Metric`](crate::metric::Metric) specialization whose
//! value lives in process memory, with optional JSON-file persistence
//! (component C3).

use crate::datatype::{Datatype, RawValue, Value};
use crate::error::{Error, Result};
use crate::metric::{Metric, ReadFn, Tag, WriteFn};
use crate::payload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Validates a write before it is committed to the slot: given the
/// current value and the proposed new value, returns whether the write
/// should proceed.
pub type WriteValidator = Box<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// On-disk record for one memory tag, as stored in the persistence
/// file's `tag_name → record` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TagRecord {
    name: String,
    alias: u64,
    writable: bool,
    datatype_value: String,
    disable_alias: bool,
    rbe_ignore: bool,
    persistent: bool,
    current_value: serde_json::Value,
}

/// Construction parameters for a [`MemoryTag`].
pub struct MemoryTagConfig {
    /// Tag name.
    pub name: String,
    /// Tag alias (0 for unaliased).
    pub alias: u64,
    /// Tag datatype.
    pub datatype: Datatype,
    /// Skip alias in payloads, always carry `name`.
    pub disable_alias: bool,
    /// Exclude from RBE scans.
    pub rbe_ignore: bool,
    /// Accept external writes (e.g. via NCMD).
    pub writable: bool,
    /// Value to seed the slot with absent a persisted record.
    pub initial_value: Value,
    /// Persist this tag's value to `persistence_path` on save ticks,
    /// and adopt it from that file at construction.
    pub persistent: bool,
    /// Shared persistence file path (one file holds all persistent
    /// tags, keyed by name).
    pub persistence_path: Option<PathBuf>,
}

/// A tag whose value lives in an in-memory slot, optionally validated
/// on write and optionally persisted to a shared JSON file.
pub struct MemoryTag {
    metric: Metric,
    slot: Arc<Mutex<Value>>,
    persistent: bool,
    persistence_path: Option<PathBuf>,
}

impl MemoryTag {
    /// Creates a memory tag. If `config.persistent` and a record for
    /// `config.name` already exists at `config.persistence_path`, the
    /// slot adopts the persisted value instead of `config.initial_value`
    /// — a [`crate::error::Error::Persistence`] while loading is logged
    /// by the caller and the initial value is kept, per the propagation
    /// policy in spec §7.
    pub fn new(config: MemoryTagConfig, validator: Option<WriteValidator>) -> Result<Self> {
        let mut initial = config.initial_value;

        if config.persistent {
            if let Some(path) = &config.persistence_path {
                match load_record(path, &config.name) {
                    Ok(Some(record)) => {
                        if let Ok(adopted) = value_from_json(config.datatype, &record.current_value)
                        {
                            initial = adopted;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        log::warn!(
                            "memory tag '{}': failed to load persisted value, keeping initial: {e}",
                            config.name
                        );
                    }
                }
            }
        }

        let slot = Arc::new(Mutex::new(initial));
        let read_slot = slot.clone();
        let write_slot = slot.clone();

        let read_fn: ReadFn = Box::new(move |_prev| {
            Ok(read_slot
                .lock()
                .expect("memory tag slot mutex poisoned")
                .clone())
        });

        let write_fn: WriteFn = Box::new(move |new_value| {
            let mut guard = write_slot.lock().expect("memory tag slot mutex poisoned");
            if let Some(validator) = validator.as_ref() {
                if !validator(&guard, new_value) {
                    return false;
                }
            }
            *guard = new_value.clone();
            true
        });

        let metric = Metric::new(
            config.name,
            config.alias,
            config.datatype,
            config.disable_alias,
            config.rbe_ignore,
            config.writable,
            read_fn,
            Some(write_fn),
        );

        Ok(Self {
            metric,
            slot,
            persistent: config.persistent,
            persistence_path: config.persistence_path,
        })
    }

    /// The tag's current slot value, independent of whether `read()`
    /// has been called this tick.
    pub fn slot_value(&self) -> Value {
        self.slot.lock().expect("memory tag slot mutex poisoned").clone()
    }

    /// Writes this tag's current record into its persistence file,
    /// creating the file (and any missing parent directories) with an
    /// empty object if it does not yet exist, then overwriting just
    /// this tag's entry and rewriting the whole map.
    pub fn save_to_disk(&self) -> Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        if !self.persistent {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut map: BTreeMap<String, TagRecord> = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            BTreeMap::new()
        };

        let record = TagRecord {
            name: self.metric.name().to_string(),
            alias: self.metric.alias(),
            writable: self.metric.is_writable(),
            datatype_value: format!("{:?}", self.metric.datatype()),
            disable_alias: self.metric.disable_alias(),
            rbe_ignore: self.metric.rbe_ignore(),
            persistent: self.persistent,
            current_value: value_to_json(&self.slot_value()),
        };
        map.insert(self.metric.name().to_string(), record);

        let serialized = serde_json::to_string_pretty(&map)?;
        write_atomically(path, &serialized)
    }
}

impl Tag for MemoryTag {
    fn name(&self) -> &str {
        self.metric.name()
    }
    fn alias(&self) -> u64 {
        self.metric.alias()
    }
    fn datatype(&self) -> Datatype {
        self.metric.datatype()
    }
    fn is_writable(&self) -> bool {
        self.metric.is_writable()
    }
    fn rbe_ignore(&self) -> bool {
        self.metric.rbe_ignore()
    }
    fn read(&mut self, now_ms: u64) -> bool {
        self.metric.read(now_ms)
    }
    fn write(&mut self, raw: &RawValue) -> bool {
        self.metric.write(raw)
    }
    fn value_changed(&self) -> bool {
        self.metric.value_changed()
    }
    fn as_birth_metric(&self) -> payload::Metric {
        self.metric.as_birth_metric()
    }
    fn as_rbe_metric(&self) -> payload::Metric {
        self.metric.as_rbe_metric()
    }
    fn save_to_disk(&self) -> Result<()> {
        MemoryTag::save_to_disk(self)
    }
}

fn load_record(path: &Path, name: &str) -> Result<Option<TagRecord>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(None);
    }
    let map: BTreeMap<String, TagRecord> = serde_json::from_str(&contents)?;
    Ok(map.get(name).cloned())
}

fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Int(i) => serde_json::json!(i),
        Value::UInt(u) => serde_json::json!(u),
        Value::Float(f) => serde_json::json!(f),
        Value::Double(d) => serde_json::json!(d),
        Value::Boolean(b) => serde_json::json!(b),
        Value::Text(s) => serde_json::json!(s),
        Value::Bytes(b) => serde_json::json!(b),
    }
}

fn value_from_json(datatype: Datatype, json: &serde_json::Value) -> Result<Value> {
    let err = || Error::Persistence(format!("value {json} does not match datatype {datatype:?}"));
    if datatype.is_number() {
        if matches!(datatype, Datatype::Float | Datatype::Double) {
            let f = json.as_f64().ok_or_else(err)?;
            return Ok(if datatype == Datatype::Float {
                Value::Float(f as f32)
            } else {
                Value::Double(f)
            });
        }
        let i = json.as_i64().ok_or_else(err)?;
        return datatype.coerce_int(i);
    }
    match datatype {
        Datatype::Boolean => Ok(Value::Boolean(json.as_bool().ok_or_else(err)?)),
        Datatype::String | Datatype::Text | Datatype::UUID => {
            Ok(Value::Text(json.as_str().ok_or_else(err)?.to_string()))
        }
        Datatype::Bytes | Datatype::File => {
            let arr = json.as_array().ok_or_else(err)?;
            let bytes = arr
                .iter()
                .map(|v| v.as_u64().map(|n| n as u8).ok_or_else(err))
                .collect::<Result<Vec<u8>>>()?;
            Ok(Value::Bytes(bytes))
        }
        _ => Err(err()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(dir: &Path, persistent: bool) -> MemoryTagConfig {
        MemoryTagConfig {
            name: "counter".into(),
            alias: 0,
            datatype: Datatype::Int64,
            disable_alias: false,
            rbe_ignore: false,
            writable: true,
            initial_value: Value::Int(7),
            persistent,
            persistence_path: Some(dir.join("tags.json")),
        }
    }

    #[test]
    fn read_returns_slot_value_unchanged() {
        let dir = tempdir().unwrap();
        let mut tag = MemoryTag::new(config(dir.path(), false), None).unwrap();
        assert!(tag.read(1));
        assert_eq!(tag.slot_value(), Value::Int(7));
    }

    #[test]
    fn write_updates_slot() {
        let dir = tempdir().unwrap();
        let mut tag = MemoryTag::new(config(dir.path(), false), None).unwrap();
        assert!(tag.write(&RawValue::Int(99)));
        assert_eq!(tag.slot_value(), Value::Int(99));
    }

    #[test]
    fn validator_rejecting_aborts_without_mutation() {
        let dir = tempdir().unwrap();
        let validator: WriteValidator = Box::new(|current, new| {
            matches!((current, new), (Value::Int(c), Value::Int(n)) if n > c)
        });
        let mut tag = MemoryTag::new(config(dir.path(), false), Some(validator)).unwrap();
        assert!(!tag.write(&RawValue::Int(3)));
        assert_eq!(tag.slot_value(), Value::Int(7));
        assert!(tag.write(&RawValue::Int(10)));
        assert_eq!(tag.slot_value(), Value::Int(10));
    }

    #[test]
    fn save_then_reconstruct_restores_written_value() {
        let dir = tempdir().unwrap();
        let mut tag = MemoryTag::new(config(dir.path(), true), None).unwrap();
        assert!(tag.write(&RawValue::Int(99)));
        tag.save_to_disk().unwrap();

        let restored = MemoryTag::new(config(dir.path(), true), None).unwrap();
        assert_eq!(restored.slot_value(), Value::Int(99));
    }

    #[test]
    fn save_to_disk_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested").join("sub");
        let mut cfg = config(&nested, true);
        cfg.persistence_path = Some(nested.join("tags.json"));
        let tag = MemoryTag::new(cfg, None).unwrap();
        tag.save_to_disk().unwrap();
        assert!(nested.join("tags.json").exists());
    }
}
