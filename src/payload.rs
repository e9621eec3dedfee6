//! Sparkplug B `Payload` protobuf messages.
//!
//! These are hand-written `prost::Message`/`prost::Oneof` derives for
//! the subset of the Sparkplug B payload schema this edge node needs —
//! there is no `.proto` file or `prost-build` codegen step, following
//! the pattern `prost`'s own test suite uses for hand-authored messages
//! (`tests/src/debug.rs`).

use crate::datatype::WireField;
use crate::error::{Error, Result};
use prost::{Message, Oneof};

/// One Sparkplug B value oneof, tagged by [`crate::datatype::WireField`].
///
/// Tag numbers match the real Sparkplug B `Metric.value` oneof
/// (`int_value = 10` through `bytes_value = 16`), which starts past the
/// scalar fields `timestamp`/`datatype`/`is_null`/`properties` on
/// [`Metric`] — `prost-derive` pools oneof and scalar tags into one
/// namespace per message, so the oneof cannot reuse any of those.
#[derive(Clone, PartialEq, Oneof)]
pub enum MetricValue {
    /// `int_value = 10` — narrow integers, carried unsigned on the wire.
    #[prost(uint32, tag = "10")]
    IntValue(u32),
    /// `long_value = 11` — 64-bit integers, carried unsigned on the wire.
    #[prost(uint64, tag = "11")]
    LongValue(u64),
    /// `float_value = 12`.
    #[prost(float, tag = "12")]
    FloatValue(f32),
    /// `double_value = 13`.
    #[prost(double, tag = "13")]
    DoubleValue(f64),
    /// `boolean_value = 14`.
    #[prost(bool, tag = "14")]
    BooleanValue(bool),
    /// `string_value = 15`.
    #[prost(string, tag = "15")]
    StringValue(String),
    /// `bytes_value = 16`.
    #[prost(bytes, tag = "16")]
    BytesValue(Vec<u8>),
}

/// One property value within a [`PropertySet`].
#[derive(Clone, PartialEq, Oneof)]
pub enum PropertyValue {
    /// Boolean property value — the only kind this edge node emits,
    /// for the `readOnly` birth property.
    #[prost(bool, tag = "11")]
    BooleanValue(bool),
}

/// A Sparkplug B property set: parallel arrays of keys, datatypes, and
/// values.
#[derive(Clone, PartialEq, Message)]
pub struct PropertySet {
    /// Property names.
    #[prost(string, repeated, tag = "1")]
    pub keys: Vec<String>,
    /// Property datatypes, one per key.
    #[prost(uint32, repeated, tag = "2")]
    pub types: Vec<u32>,
    /// Property values, one per key.
    #[prost(oneof = "PropertyValue", tags = "11")]
    pub value: Option<PropertyValue>,
}

/// A single metric entry within a [`Payload`].
#[derive(Clone, PartialEq, Message)]
pub struct Metric {
    /// Metric name. Omitted when the metric is birthed with an alias
    /// and `disable_alias` is false.
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    /// Metric alias. Omitted for unaliased metrics (alias 0) or when
    /// `name` is present instead.
    #[prost(uint64, optional, tag = "2")]
    pub alias: Option<u64>,
    /// Per-metric timestamp, milliseconds since epoch.
    #[prost(uint64, optional, tag = "3")]
    pub timestamp: Option<u64>,
    /// Sparkplug datatype code (see [`crate::datatype::Datatype`]).
    #[prost(uint32, optional, tag = "4")]
    pub datatype: Option<u32>,
    /// `true` if this metric's current value is null; when set, the
    /// value oneof is omitted.
    #[prost(bool, optional, tag = "7")]
    pub is_null: Option<bool>,
    /// Birth-only metadata (currently just `readOnly`).
    #[prost(message, optional, tag = "9")]
    pub properties: Option<PropertySet>,
    /// The metric's value, tagged by wire field.
    #[prost(oneof = "MetricValue", tags = "10, 11, 12, 13, 14, 15, 16")]
    pub value: Option<MetricValue>,
}

/// The Sparkplug B `Payload` message: a timestamped batch of metrics
/// carrying the session's `seq`.
#[derive(Clone, PartialEq, Message)]
pub struct Payload {
    /// Payload timestamp, milliseconds since epoch.
    #[prost(uint64, optional, tag = "1")]
    pub timestamp: Option<u64>,
    /// The metrics carried in this payload.
    #[prost(message, repeated, tag = "2")]
    pub metrics: Vec<Metric>,
    /// Session sequence number. Absent from NDEATH per the Non-goal
    /// recorded in DESIGN.md (Open Question 4).
    #[prost(uint64, optional, tag = "3")]
    pub seq: Option<u64>,
}

impl Payload {
    /// Encodes this payload to its protobuf wire bytes.
    pub fn encode_to_vec(&self) -> Vec<u8> {
        Message::encode_to_vec(self)
    }

    /// Decodes a payload from protobuf wire bytes.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        Message::decode(buf).map_err(|e| Error::Decode(format!("payload decode failed: {e}")))
    }
}

/// Builds a [`MetricValue`] for an integer-like wire field from its raw
/// bit pattern (already two's-complement-reinterpreted via
/// [`crate::datatype::int_to_uint`] by the caller).
pub fn int_value(field: WireField, bits: u64) -> MetricValue {
    match field {
        WireField::Int => MetricValue::IntValue(bits as u32),
        WireField::Long => MetricValue::LongValue(bits),
        other => unreachable!("int_value called for non-integer wire field {other:?}"),
    }
}
