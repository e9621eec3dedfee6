//! Edge Node Runtime: session lifecycle, NCMD dispatch, and the
//! periodic scan/RBE/save loop (component C5).

use crate::broker::BrokerInfo;
use crate::config::{self, NodeConfig, RecreateNodeArgs};
use crate::counter::RollingCounter;
use crate::datatype::{Datatype, RawValue, Value};
use crate::error::{Error, Result};
use crate::memory_tag::{MemoryTag, MemoryTagConfig, WriteValidator};
use crate::metric::{Metric, ReadFn, Tag, WriteFn};
use crate::payload::{self, MetricValue};
use crate::topic::{MessageType, ParsedTopic};
use crate::transport::{NodeEvent, PublishId, Qos, Transport};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SCAN_RATE_TAG_NAME: &str = "Node Control/Scan Rate";
const REBIRTH_TAG_NAME: &str = "Node Control/Rebirth";
const PUBLISH_RING_CAPACITY: usize = 10;

/// Edge node session state, per the state machine in spec §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Constructed but `start_client()` has not yet been called.
    Constructed,
    /// `connect()` issued, awaiting CONNACK.
    Connecting,
    /// Connected, subscribed, and birthed.
    Online,
    /// Lost connection or CONNACK failed; the loop stops scanning.
    Disconnected,
    /// `stop_client()` was called; the node will not reconnect.
    Terminated,
}

/// What an in-flight publish id refers to, so its acknowledgement can
/// be handled correctly (advance `bdSeq` vs. advance `seq` vs. nothing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PublishKind {
    Birth,
    Rebirth,
    Data,
}

/// Identity and behavior needed to register a user metric with the
/// edge node. Supplying `alias: None` requests monotonic allocation.
pub struct MetricSpec {
    /// Metric name.
    pub name: String,
    /// Explicit alias, or `None` to allocate the next one.
    pub alias: Option<u64>,
    /// Metric datatype.
    pub datatype: Datatype,
    /// Skip alias in payloads, always carry `name`.
    pub disable_alias: bool,
    /// Exclude from RBE scans.
    pub rbe_ignore: bool,
    /// Accept external writes.
    pub writable: bool,
    /// Read callback.
    pub read_fn: ReadFn,
    /// Write callback, required if `writable`.
    pub write_fn: Option<WriteFn>,
}

/// Identity, persistence, and behavior needed to register a
/// [`MemoryTag`] with the edge node. Supplying `alias: None` requests
/// monotonic allocation, drawn from the same sequence as plain
/// [`MetricSpec`]s so the two kinds never collide.
pub struct MemoryTagSpec {
    /// Tag name.
    pub name: String,
    /// Explicit alias, or `None` to allocate the next one.
    pub alias: Option<u64>,
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
    /// Optional write validator.
    pub validator: Option<WriteValidator>,
}

/// Construction parameters for an [`EdgeNode`].
pub struct EdgeNodeConfig {
    /// Sparkplug group id. Must not be `"STATE"`.
    pub group_id: String,
    /// Sparkplug edge node id.
    pub edge_node_id: String,
    /// Candidate brokers; at least one is required, exactly one marked
    /// `primary`.
    pub brokers: Vec<BrokerInfo>,
    /// Initial scan interval, milliseconds. Out-of-range values are
    /// replaced with [`config::DEFAULT_SCAN_RATE_MS`].
    pub scan_rate_ms: u64,
    /// Initial config-save interval, milliseconds. Out-of-range values
    /// are replaced with [`config::DEFAULT_CONFIG_SAVE_RATE_MS`].
    pub config_save_rate_ms: u64,
    /// Path to the node config JSON file (`bdSeq` + recreate args). If
    /// it exists, `bdSeq` and the recreate args are loaded from it,
    /// overriding the constructor arguments above.
    pub config_filepath: Option<PathBuf>,
}

/// The Sparkplug B edge node runtime.
pub struct EdgeNode {
    group_id: String,
    edge_node_id: String,
    brokers: Vec<BrokerInfo>,
    current_broker_idx: usize,
    metrics: Vec<Box<dyn Tag>>,
    alias_index: HashMap<u64, usize>,
    name_index: HashMap<String, usize>,
    bd_seq: RollingCounter,
    seq: RollingCounter,
    scan_rate_slot: Arc<Mutex<Value>>,
    config_save_rate_ms: u64,
    last_scan_ms: u64,
    last_save_ms: u64,
    publish_ring: VecDeque<(PublishId, PublishKind)>,
    transport: Box<dyn Transport>,
    state: NodeState,
    config_filepath: Option<PathBuf>,
}

impl EdgeNode {
    /// Validates and constructs an edge node. Does not connect; call
    /// [`EdgeNode::start_client`] to begin the session.
    pub fn new(
        config: EdgeNodeConfig,
        metric_specs: Vec<MetricSpec>,
        memory_tag_specs: Vec<MemoryTagSpec>,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        if config.group_id == "STATE" {
            return Err(Error::Validation(
                "group_id 'STATE' is reserved for host-application state topics".into(),
            ));
        }
        if config.brokers.is_empty() {
            return Err(Error::Validation("at least one broker is required".into()));
        }
        let current_broker_idx = config
            .brokers
            .iter()
            .position(|b| b.primary)
            .unwrap_or(0);

        for name in metric_specs
            .iter()
            .map(|s| &s.name)
            .chain(memory_tag_specs.iter().map(|s| &s.name))
        {
            if name == SCAN_RATE_TAG_NAME || name == REBIRTH_TAG_NAME {
                return Err(Error::Validation(format!(
                    "metric name '{name}' is reserved for node control"
                )));
            }
        }

        let scan_rate_ms = config::clamp_or_default(
            config.scan_rate_ms,
            config::MIN_SCAN_RATE_MS,
            config::MAX_SCAN_RATE_MS,
            config::DEFAULT_SCAN_RATE_MS,
        );
        let config_save_rate_ms = config::clamp_or_default(
            config.config_save_rate_ms,
            config::MIN_CONFIG_SAVE_RATE_MS,
            config::MAX_CONFIG_SAVE_RATE_MS,
            config::DEFAULT_CONFIG_SAVE_RATE_MS,
        );

        let mut bd_seq = RollingCounter::new(1u64 << 32);
        let mut effective_scan_rate = scan_rate_ms;
        let mut effective_save_rate = config_save_rate_ms;
        if let Some(path) = &config.config_filepath {
            if let Some(loaded) = NodeConfig::load(path)? {
                for _ in 0..loaded.bd_seq {
                    bd_seq.next_value();
                }
                effective_scan_rate = loaded.recreate_node_args.scan_rate;
                effective_save_rate = loaded.recreate_node_args.config_save_rate;
            }
        }

        let mut metrics: Vec<Box<dyn Tag>> =
            Vec::with_capacity(metric_specs.len() + memory_tag_specs.len() + 2);
        let mut alias_index = HashMap::new();
        let mut name_index = HashMap::new();
        let mut next_alias: u64 = 1;

        for spec in metric_specs {
            let alias = spec.alias.unwrap_or_else(|| {
                let a = next_alias;
                next_alias += 1;
                a
            });
            if alias != 0 && alias_index.contains_key(&alias) {
                return Err(Error::Validation(format!("duplicate alias {alias}")));
            }
            let idx = metrics.len();
            if !spec.disable_alias && alias != 0 {
                alias_index.insert(alias, idx);
            }
            name_index.insert(spec.name.clone(), idx);
            metrics.push(Box::new(Metric::new(
                spec.name,
                alias,
                spec.datatype,
                spec.disable_alias,
                spec.rbe_ignore,
                spec.writable,
                spec.read_fn,
                spec.write_fn,
            )));
        }

        for spec in memory_tag_specs {
            let alias = spec.alias.unwrap_or_else(|| {
                let a = next_alias;
                next_alias += 1;
                a
            });
            if alias != 0 && alias_index.contains_key(&alias) {
                return Err(Error::Validation(format!("duplicate alias {alias}")));
            }
            let idx = metrics.len();
            if !spec.disable_alias && alias != 0 {
                alias_index.insert(alias, idx);
            }
            name_index.insert(spec.name.clone(), idx);
            let memory_config = MemoryTagConfig {
                name: spec.name,
                alias,
                datatype: spec.datatype,
                disable_alias: spec.disable_alias,
                rbe_ignore: spec.rbe_ignore,
                writable: spec.writable,
                initial_value: spec.initial_value,
                persistent: spec.persistent,
                persistence_path: spec.persistence_path,
            };
            metrics.push(Box::new(MemoryTag::new(memory_config, spec.validator)?));
        }

        let scan_rate_slot = Arc::new(Mutex::new(Value::Int(effective_scan_rate as i64)));
        let read_slot = scan_rate_slot.clone();
        let scan_rate_read: ReadFn = Box::new(move |_| Ok(read_slot.lock().unwrap().clone()));
        let scan_rate_idx = metrics.len();
        name_index.insert(SCAN_RATE_TAG_NAME.to_string(), scan_rate_idx);
        metrics.push(Box::new(Metric::new(
            SCAN_RATE_TAG_NAME,
            0,
            Datatype::Int64,
            true,
            true,
            true,
            scan_rate_read,
            None,
        )));

        let rebirth_idx = metrics.len();
        name_index.insert(REBIRTH_TAG_NAME.to_string(), rebirth_idx);
        metrics.push(Box::new(Metric::new(
            REBIRTH_TAG_NAME,
            0,
            Datatype::Boolean,
            true,
            true,
            true,
            Box::new(|_| Ok(Value::Boolean(false))),
            None,
        )));

        Ok(Self {
            group_id: config.group_id,
            edge_node_id: config.edge_node_id,
            brokers: config.brokers,
            current_broker_idx,
            metrics,
            alias_index,
            name_index,
            bd_seq,
            seq: RollingCounter::new(256),
            scan_rate_slot,
            config_save_rate_ms: effective_save_rate,
            last_scan_ms: 0,
            last_save_ms: 0,
            publish_ring: VecDeque::with_capacity(PUBLISH_RING_CAPACITY),
            transport,
            state: NodeState::Constructed,
            config_filepath: config.config_filepath,
        })
    }

    /// Current session state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// The currently-advertised `bdSeq`.
    pub fn bd_seq(&self) -> u32 {
        self.bd_seq.current_value() as u32
    }

    /// The current session's `seq`.
    pub fn seq(&self) -> u8 {
        self.seq.current_value() as u8
    }

    /// Current effective scan interval, milliseconds.
    pub fn scan_rate_ms(&self) -> u64 {
        match *self.scan_rate_slot.lock().unwrap() {
            Value::Int(i) => i as u64,
            _ => config::DEFAULT_SCAN_RATE_MS,
        }
    }

    /// The broker this session is currently connected (or connecting)
    /// to. Always the primary broker: failover beyond it is a Non-goal.
    pub fn broker(&self) -> &BrokerInfo {
        &self.brokers[self.current_broker_idx]
    }

    fn ndeath_topic(&self) -> Result<String> {
        ParsedTopic::node_topic(MessageType::NDeath, &self.group_id, &self.edge_node_id)
    }
    fn nbirth_topic(&self) -> Result<String> {
        ParsedTopic::node_topic(MessageType::NBirth, &self.group_id, &self.edge_node_id)
    }
    fn ndata_topic(&self) -> Result<String> {
        ParsedTopic::node_topic(MessageType::NData, &self.group_id, &self.edge_node_id)
    }
    fn ncmd_topic(&self) -> Result<String> {
        ParsedTopic::node_topic(MessageType::NCmd, &self.group_id, &self.edge_node_id)
    }

    /// Transitions `Constructed → Connecting`: builds the NDEATH Will
    /// from the current `bdSeq`, registers it, and initiates the
    /// connection.
    pub fn start_client(&mut self) -> Result<()> {
        let ndeath = bd_seq_metric_payload(self.bd_seq.current_value() as u32, 0);
        let ndeath_topic = self.ndeath_topic()?;
        self.transport
            .set_will(&ndeath_topic, Qos::AtLeastOnce, false, ndeath.encode_to_vec())?;
        self.transport.connect()?;
        self.state = NodeState::Connecting;
        Ok(())
    }

    /// Halts the session without reconnecting.
    pub fn stop_client(&mut self) -> Result<()> {
        self.transport.disconnect()?;
        self.state = NodeState::Terminated;
        Ok(())
    }

    /// One iteration of the cooperative main loop: drains transport
    /// events, then runs scan/save ticks if due. Never blocks longer
    /// than one scan interval.
    pub fn tick(&mut self, now_ms: u64) -> Result<()> {
        self.handle_events(now_ms)?;
        if self.state != NodeState::Online {
            return Ok(());
        }
        if now_ms.saturating_sub(self.last_scan_ms) >= self.scan_rate_ms() {
            self.scan_and_publish_rbe(now_ms)?;
            self.last_scan_ms = now_ms;
        }
        if now_ms.saturating_sub(self.last_save_ms) >= self.config_save_rate_ms {
            self.save_config_and_tags(now_ms)?;
            self.last_save_ms = now_ms;
        }
        Ok(())
    }

    fn handle_events(&mut self, now_ms: u64) -> Result<()> {
        let events = self.transport.poll_events(Duration::from_millis(0));
        for event in events {
            match event {
                NodeEvent::ConnAck { success: true } => self.on_connack_success(now_ms)?,
                NodeEvent::ConnAck { success: false } => {
                    log::error!("broker rejected connection");
                    self.state = NodeState::Disconnected;
                }
                NodeEvent::PubAck { id } => self.on_puback(id),
                NodeEvent::Message { topic, payload } => {
                    self.on_message(&topic, &payload, now_ms)?
                }
                NodeEvent::Disconnected => {
                    log::error!("transport disconnected");
                    self.state = NodeState::Disconnected;
                }
            }
        }
        Ok(())
    }

    fn on_connack_success(&mut self, now_ms: u64) -> Result<()> {
        let ncmd_topic = self.ncmd_topic()?;
        self.transport.subscribe(&ncmd_topic)?;
        self.seq.reset();
        for m in self.metrics.iter_mut() {
            m.read(now_ms);
        }
        self.publish_nbirth(now_ms, self.bd_seq.current_value() as u32, PublishKind::Birth)?;
        self.state = NodeState::Online;
        Ok(())
    }

    fn publish_nbirth(&mut self, now_ms: u64, bd_seq_value: u32, kind: PublishKind) -> Result<()> {
        let mut metrics = Vec::with_capacity(self.metrics.len() + 1);
        metrics.push(bd_seq_metric_payload(bd_seq_value, now_ms).metrics.remove(0));
        for m in &self.metrics {
            metrics.push(m.as_birth_metric());
        }
        let payload = payload::Payload {
            timestamp: Some(now_ms),
            metrics,
            seq: Some(0),
        };
        let topic = self.nbirth_topic()?;
        let id = self
            .transport
            .publish(&topic, Qos::AtMostOnce, false, payload.encode_to_vec())?;
        push_ring(&mut self.publish_ring, id, kind);
        Ok(())
    }

    fn on_puback(&mut self, id: PublishId) {
        if let Some(pos) = self.publish_ring.iter().position(|(i, _)| *i == id) {
            let (_, kind) = self.publish_ring.remove(pos).unwrap();
            match kind {
                PublishKind::Birth => {
                    self.bd_seq.next_value();
                }
                PublishKind::Data => {
                    self.seq.next_value();
                }
                PublishKind::Rebirth => {}
            }
        }
    }

    fn on_message(&mut self, topic: &str, payload: &[u8], now_ms: u64) -> Result<()> {
        let ncmd_topic = self.ncmd_topic()?;
        if topic == ncmd_topic {
            self.handle_ncmd(payload, now_ms)?;
        }
        Ok(())
    }

    fn handle_ncmd(&mut self, payload_bytes: &[u8], now_ms: u64) -> Result<()> {
        let decoded = match payload::Payload::decode(payload_bytes) {
            Ok(p) => p,
            Err(e) => {
                log::error!("failed to decode NCMD payload: {e}");
                return Ok(());
            }
        };

        let mut publish_needed = false;
        for metric in &decoded.metrics {
            let Some(name) = self.resolve_name(metric) else {
                log::error!("NCMD metric has neither name nor known alias");
                continue;
            };

            if name == REBIRTH_TAG_NAME {
                if matches!(raw_value_from_metric(metric), Some(RawValue::Bool(true))) {
                    self.perform_rebirth(now_ms)?;
                    return Ok(());
                }
                continue;
            }

            if name == SCAN_RATE_TAG_NAME {
                let Some(RawValue::Int(requested)) = raw_value_from_metric(metric) else {
                    log::error!("Scan Rate NCMD missing an integer value");
                    continue;
                };
                let requested = requested.max(0) as u64;
                if (config::MIN_SCAN_RATE_MS..=config::MAX_SCAN_RATE_MS).contains(&requested) {
                    *self.scan_rate_slot.lock().unwrap() = Value::Int(requested as i64);
                    publish_needed = true;
                } else {
                    log::warn!(
                        "rejected scan rate {requested}ms, outside [{}, {}]",
                        config::MIN_SCAN_RATE_MS,
                        config::MAX_SCAN_RATE_MS
                    );
                }
                continue;
            }

            let Some(&idx) = self.name_index.get(&name) else {
                log::error!("NCMD targets unknown metric '{name}'");
                continue;
            };
            if !self.metrics[idx].is_writable() {
                log::warn!("NCMD write to non-writable metric '{name}' rejected");
                continue;
            }
            let Some(raw) = raw_value_from_metric(metric) else {
                log::error!("NCMD metric '{name}' is missing a value field");
                continue;
            };
            if self.metrics[idx].write(&raw) {
                publish_needed = true;
            } else {
                log::error!("write to '{name}' failed");
            }
        }

        if publish_needed {
            self.scan_and_publish_rbe(now_ms)?;
        }
        Ok(())
    }

    fn resolve_name(&self, metric: &payload::Metric) -> Option<String> {
        if let Some(name) = &metric.name {
            return Some(name.clone());
        }
        let alias = metric.alias?;
        self.alias_index
            .get(&alias)
            .map(|&idx| self.metrics[idx].name().to_string())
    }

    /// Republishes a full NBIRTH using the *previous* `bdSeq` — the
    /// value still bound to the live Will — without advancing `bdSeq`
    /// again, since no new MQTT session (and thus no new Will) is
    /// created by a mid-session rebirth.
    fn perform_rebirth(&mut self, now_ms: u64) -> Result<()> {
        self.seq.reset();
        for m in self.metrics.iter_mut() {
            m.read(now_ms);
        }
        let previous_bd_seq = self.bd_seq.previous_value() as u32;
        self.publish_nbirth(now_ms, previous_bd_seq, PublishKind::Rebirth)
    }

    fn scan_and_publish_rbe(&mut self, now_ms: u64) -> Result<()> {
        let mut changed = Vec::new();
        for m in self.metrics.iter_mut() {
            m.read(now_ms);
            if m.value_changed() && !m.rbe_ignore() {
                changed.push(m.as_rbe_metric());
            }
        }
        if changed.is_empty() {
            return Ok(());
        }
        let payload = payload::Payload {
            timestamp: Some(now_ms),
            metrics: changed,
            seq: Some(self.seq.current_value()),
        };
        let topic = self.ndata_topic()?;
        let id = self
            .transport
            .publish(&topic, Qos::AtMostOnce, false, payload.encode_to_vec())?;
        push_ring(&mut self.publish_ring, id, PublishKind::Data);
        Ok(())
    }

    fn save_config_and_tags(&mut self, _now_ms: u64) -> Result<()> {
        if let Some(path) = &self.config_filepath {
            let node_config = NodeConfig {
                bd_seq: self.bd_seq.current_value() as u32,
                recreate_node_args: RecreateNodeArgs {
                    scan_rate: self.scan_rate_ms(),
                    config_save_rate: self.config_save_rate_ms,
                },
            };
            node_config.save(path)?;
        }
        for m in &self.metrics {
            if let Err(e) = m.save_to_disk() {
                log::warn!("failed to persist tag '{}': {e}", m.name());
            }
        }
        Ok(())
    }
}

fn push_ring(ring: &mut VecDeque<(PublishId, PublishKind)>, id: PublishId, kind: PublishKind) {
    ring.push_back((id, kind));
    if ring.len() > PUBLISH_RING_CAPACITY {
        ring.pop_front();
    }
}

fn bd_seq_metric_payload(bd_seq: u32, now_ms: u64) -> payload::Payload {
    payload::Payload {
        timestamp: Some(now_ms),
        metrics: vec![payload::Metric {
            name: Some("bdSeq".to_string()),
            alias: None,
            timestamp: Some(now_ms),
            datatype: Some(Datatype::UInt64.code()),
            is_null: None,
            properties: None,
            value: Some(MetricValue::LongValue(bd_seq as u64)),
        }],
        seq: None,
    }
}

/// Converts a decoded protobuf metric's value oneof into a canonical
/// [`RawValue`] for coercion. Protobuf's oneof already disambiguates
/// the wire field unambiguously; the camelCase/snake_case matching
/// rule in spec §4.5 only matters for JSON-shaped NCMD inputs, which
/// this transport never produces.
fn raw_value_from_metric(metric: &payload::Metric) -> Option<RawValue> {
    match &metric.value {
        Some(MetricValue::IntValue(v)) => Some(RawValue::Int(*v as i64)),
        Some(MetricValue::LongValue(v)) => Some(RawValue::Int(*v as i64)),
        Some(MetricValue::FloatValue(f)) => Some(RawValue::Float(*f as f64)),
        Some(MetricValue::DoubleValue(d)) => Some(RawValue::Float(*d)),
        Some(MetricValue::BooleanValue(b)) => Some(RawValue::Bool(*b)),
        Some(MetricValue::StringValue(s)) => Some(RawValue::Text(s.clone())),
        Some(MetricValue::BytesValue(b)) => Some(RawValue::Bytes(b.clone())),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn one_metric_node(transport: MockTransport) -> EdgeNode {
        let broker = BrokerInfo::new("edge-1", "localhost", 1883).as_primary();
        let config = EdgeNodeConfig {
            group_id: "Factory".into(),
            edge_node_id: "Line1".into(),
            brokers: vec![broker],
            scan_rate_ms: 1000,
            config_save_rate_ms: 600_000,
            config_filepath: None,
        };
        let specs = vec![MetricSpec {
            name: "temp".into(),
            alias: None,
            datatype: Datatype::Int64,
            disable_alias: false,
            rbe_ignore: false,
            writable: false,
            read_fn: Box::new(|_| Ok(Value::Int(42))),
            write_fn: None,
        }];
        EdgeNode::new(config, specs, vec![], Box::new(transport)).unwrap()
    }

    #[test]
    fn rejects_state_group_id() {
        let broker = BrokerInfo::new("edge-1", "localhost", 1883).as_primary();
        let config = EdgeNodeConfig {
            group_id: "STATE".into(),
            edge_node_id: "Line1".into(),
            brokers: vec![broker],
            scan_rate_ms: 1000,
            config_save_rate_ms: 600_000,
            config_filepath: None,
        };
        let result = EdgeNode::new(config, vec![], vec![], Box::new(MockTransport::new()));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_empty_broker_list() {
        let config = EdgeNodeConfig {
            group_id: "Factory".into(),
            edge_node_id: "Line1".into(),
            brokers: vec![],
            scan_rate_ms: 1000,
            config_save_rate_ms: 600_000,
            config_filepath: None,
        };
        let result = EdgeNode::new(config, vec![], vec![], Box::new(MockTransport::new()));
        assert!(result.is_err());
    }

    #[test]
    fn rejects_reserved_metric_names() {
        let broker = BrokerInfo::new("edge-1", "localhost", 1883).as_primary();
        let config = EdgeNodeConfig {
            group_id: "Factory".into(),
            edge_node_id: "Line1".into(),
            brokers: vec![broker],
            scan_rate_ms: 1000,
            config_save_rate_ms: 600_000,
            config_filepath: None,
        };
        let specs = vec![MetricSpec {
            name: "Node Control/Rebirth".into(),
            alias: None,
            datatype: Datatype::Boolean,
            disable_alias: false,
            rbe_ignore: false,
            writable: true,
            read_fn: Box::new(|_| Ok(Value::Boolean(false))),
            write_fn: None,
        }];
        assert!(EdgeNode::new(config, specs, vec![], Box::new(MockTransport::new())).is_err());
    }

    #[test]
    fn s1_birth_sequence_sets_will_then_publishes_nbirth_on_connack() {
        let transport = MockTransport::new();
        let mut node = one_metric_node(transport);
        node.start_client().unwrap();
        node.tick(0).unwrap();
        assert_eq!(node.state(), NodeState::Online);
        assert_eq!(node.bd_seq(), 0);
        assert_eq!(node.seq(), 0);
    }

    #[test]
    fn s2_rbe_suppresses_unchanged_second_scan() {
        let mut node = one_metric_node(MockTransport::new());
        node.start_client().unwrap();
        node.tick(0).unwrap();
        let birth_id = node.publish_ring.front().unwrap().0;
        node.on_puback(birth_id);
        assert!(node.publish_ring.is_empty());

        // temp always reads 42, so the next scan tick must not publish.
        node.tick(2000).unwrap();
        assert!(node.publish_ring.is_empty());
    }

    #[test]
    fn s4_rebirth_republishes_using_previous_bd_seq_without_advancing() {
        let mut node = one_metric_node(MockTransport::new());
        node.start_client().unwrap();
        node.tick(0).unwrap();
        let birth_id = node.publish_ring.front().unwrap().0;
        node.on_puback(birth_id);
        assert_eq!(node.bd_seq(), 1);
        assert_eq!(node.bd_seq.previous_value(), 0);

        let ncmd = payload::Payload {
            timestamp: Some(1),
            metrics: vec![payload::Metric {
                name: Some(REBIRTH_TAG_NAME.to_string()),
                alias: None,
                timestamp: Some(1),
                datatype: Some(Datatype::Boolean.code()),
                is_null: None,
                properties: None,
                value: Some(MetricValue::BooleanValue(true)),
            }],
            seq: None,
        };
        node.handle_ncmd(&ncmd.encode_to_vec(), 2000).unwrap();

        let (_, kind) = node.publish_ring.back().unwrap();
        assert_eq!(*kind, PublishKind::Rebirth);
        // Rebirth does not advance bdSeq further; it only republishes
        // the value the live Will already carries.
        assert_eq!(node.bd_seq(), 1);
    }

    #[test]
    fn s3_ncmd_write_updates_tag_and_publishes_ndata() {
        let broker = BrokerInfo::new("edge-1", "localhost", 1883).as_primary();
        let config = EdgeNodeConfig {
            group_id: "Factory".into(),
            edge_node_id: "Line1".into(),
            brokers: vec![broker],
            scan_rate_ms: 1000,
            config_save_rate_ms: 600_000,
            config_filepath: None,
        };
        let slot = Arc::new(Mutex::new(Value::Text("hi".to_string())));
        let read_slot = slot.clone();
        let write_slot = slot.clone();
        let specs = vec![MetricSpec {
            name: "greeting".into(),
            alias: None,
            datatype: Datatype::String,
            disable_alias: false,
            rbe_ignore: false,
            writable: true,
            read_fn: Box::new(move |_| Ok(read_slot.lock().unwrap().clone())),
            write_fn: Some(Box::new(move |v| {
                *write_slot.lock().unwrap() = v.clone();
                true
            })),
        }];
        let mut node = EdgeNode::new(config, specs, vec![], Box::new(MockTransport::new())).unwrap();
        node.start_client().unwrap();
        node.tick(0).unwrap();
        let birth_id = node.publish_ring.front().unwrap().0;
        node.on_puback(birth_id);
        let seq_before = node.seq();

        let ncmd = payload::Payload {
            timestamp: Some(1),
            metrics: vec![payload::Metric {
                name: Some("greeting".to_string()),
                alias: None,
                timestamp: Some(1),
                datatype: Some(Datatype::String.code()),
                is_null: None,
                properties: None,
                value: Some(MetricValue::StringValue("hello".to_string())),
            }],
            seq: None,
        };
        node.handle_ncmd(&ncmd.encode_to_vec(), 2000).unwrap();

        assert_eq!(*slot.lock().unwrap(), Value::Text("hello".to_string()));
        let (_, kind) = node.publish_ring.back().unwrap();
        assert_eq!(*kind, PublishKind::Data);
        assert_eq!(node.seq(), seq_before);
        node.on_puback(node.publish_ring.back().unwrap().0);
        assert_eq!(node.seq(), seq_before + 1);
    }

    #[test]
    fn s5_scan_rate_change_clamping() {
        let mut node = one_metric_node(MockTransport::new());
        node.start_client().unwrap();
        node.tick(0).unwrap();
        let ncmd = payload::Payload {
            timestamp: Some(1),
            metrics: vec![payload::Metric {
                name: Some(SCAN_RATE_TAG_NAME.to_string()),
                alias: None,
                timestamp: Some(1),
                datatype: Some(Datatype::Int64.code()),
                is_null: None,
                properties: None,
                value: Some(MetricValue::LongValue(400)),
            }],
            seq: None,
        };
        node.handle_ncmd(&ncmd.encode_to_vec(), 1000).unwrap();
        assert_eq!(node.scan_rate_ms(), 1000);

        let ncmd2 = payload::Payload {
            timestamp: Some(1),
            metrics: vec![payload::Metric {
                name: Some(SCAN_RATE_TAG_NAME.to_string()),
                alias: None,
                timestamp: Some(1),
                datatype: Some(Datatype::Int64.code()),
                is_null: None,
                properties: None,
                value: Some(MetricValue::LongValue(2000)),
            }],
            seq: None,
        };
        node.handle_ncmd(&ncmd2.encode_to_vec(), 1000).unwrap();
        assert_eq!(node.scan_rate_ms(), 2000);
    }

    #[test]
    fn s6_save_config_and_tags_persists_registered_memory_tags() {
        let dir = tempfile::tempdir().unwrap();
        let tags_path = dir.path().join("tags.json");

        let broker = BrokerInfo::new("edge-1", "localhost", 1883).as_primary();
        let config = EdgeNodeConfig {
            group_id: "Factory".into(),
            edge_node_id: "Line1".into(),
            brokers: vec![broker],
            scan_rate_ms: 1000,
            config_save_rate_ms: 600_000,
            config_filepath: None,
        };
        let memory_specs = vec![MemoryTagSpec {
            name: "setpoint".into(),
            alias: None,
            datatype: Datatype::Int64,
            disable_alias: false,
            rbe_ignore: false,
            writable: true,
            initial_value: Value::Int(7),
            persistent: true,
            persistence_path: Some(tags_path.clone()),
            validator: None,
        }];
        let mut node =
            EdgeNode::new(config, vec![], memory_specs, Box::new(MockTransport::new())).unwrap();

        node.save_config_and_tags(0).unwrap();

        let contents = std::fs::read_to_string(&tags_path).unwrap();
        assert!(contents.contains("setpoint"));
        assert!(contents.contains("\"current_value\": 7"));
    }
}
