//! A Sparkplug B edge node runtime.
//!
//! This crate implements the edge-node half of a Sparkplug B session:
//! the birth/death certificate lifecycle, `bdSeq`/`seq` bookkeeping,
//! periodic report-by-exception tag scanning, inbound `NCMD` dispatch
//! (rebirth, scan-rate changes, writable-tag writes), and durable
//! persistence of writable-tag values and node configuration across
//! restarts.
//!
//! # Architecture
//!
//! - [`datatype`]: the closed set of Sparkplug scalar datatypes, their
//!   protobuf wire fields, and value coercion rules.
//! - [`metric`]: [`metric::Metric`], one named tag with read/write
//!   callbacks, change detection, and birth/RBE payload shaping, plus
//!   the [`metric::Tag`] capability trait both metric kinds implement.
//! - [`memory_tag`]: [`memory_tag::MemoryTag`], a metric specialization
//!   backed by an in-memory slot with optional JSON-file persistence.
//! - [`topic`]: Sparkplug topic parsing and construction.
//! - [`payload`]: the protobuf `Payload`/`Metric` wire schema.
//! - [`transport`]: the [`transport::Transport`] abstraction the edge
//!   node runtime is written against, plus [`transport::RumqttcTransport`].
//! - [`broker`]: MQTT broker connection info.
//! - [`config`]: node configuration persistence (`bdSeq`, scan/save
//!   rates) and the clamping rules applied to them.
//! - [`counter`]: the rolling `seq`/`bdSeq` counters.
//! - [`node`]: [`node::EdgeNode`], the runtime tying all of the above
//!   together into the session state machine.
//!
//! # Example
//!
//! ```no_run
//! use sparkplug_edge_node::broker::BrokerInfo;
//! use sparkplug_edge_node::datatype::{Datatype, Value};
//! use sparkplug_edge_node::node::{EdgeNode, EdgeNodeConfig, MetricSpec};
//! use sparkplug_edge_node::transport::RumqttcTransport;
//!
//! # fn main() -> sparkplug_edge_node::error::Result<()> {
//! let broker = BrokerInfo::new("line1-edge", "localhost", 1883)
//!     .as_primary()
//!     .without_tls();
//!
//! let config = EdgeNodeConfig {
//!     group_id: "Factory".into(),
//!     edge_node_id: "Line1".into(),
//!     brokers: vec![broker.clone()],
//!     scan_rate_ms: 1000,
//!     config_save_rate_ms: 600_000,
//!     config_filepath: Some("node_config.json".into()),
//! };
//!
//! let temp = MetricSpec {
//!     name: "temp".into(),
//!     alias: None,
//!     datatype: Datatype::Int64,
//!     disable_alias: false,
//!     rbe_ignore: false,
//!     writable: false,
//!     read_fn: Box::new(|_| Ok(Value::Int(42))),
//!     write_fn: None,
//! };
//!
//! let transport = RumqttcTransport::new(&broker)?;
//! let mut node = EdgeNode::new(config, vec![temp], vec![], Box::new(transport))?;
//! node.start_client()?;
//!
//! loop {
//!     node.tick(current_time_ms())?;
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! # }
//! # fn current_time_ms() -> u64 { 0 }
//! ```

#![warn(missing_docs)]

pub mod broker;
pub mod config;
pub mod counter;
pub mod datatype;
pub mod error;
pub mod memory_tag;
pub mod metric;
pub mod node;
pub mod payload;
pub mod topic;
pub mod transport;

pub use broker::BrokerInfo;
pub use error::{Error, Result};
pub use metric::{Metric, Tag};
pub use node::{EdgeNode, EdgeNodeConfig, MemoryTagSpec, MetricSpec};
