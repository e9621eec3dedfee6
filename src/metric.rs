//! Metric: one named, typed tag owned by an edge node (component C2).

use crate::datatype::{int_to_uint, Datatype, RawValue, Value, WireField};
use crate::payload;

/// Callback invoked on a scan tick to obtain a metric's latest value.
/// Receives the metric's prior current value; returns the new value, or
/// `Err` if the read failed (state is left unchanged in that case).
pub type ReadFn = Box<dyn FnMut(Option<&Value>) -> Result<Value, String> + Send>;

/// Callback invoked when a write is accepted by a writable metric.
/// Returns `true` if the underlying write succeeded.
pub type WriteFn = Box<dyn FnMut(&Value) -> bool + Send>;

/// Hook fired unconditionally after every `read()`, given the resulting
/// current value (if any) and whether the read succeeded.
pub type OnReadHook = Box<dyn FnMut(Option<&Value>, bool) + Send>;

/// Hook fired after every accepted `write()` attempt, given the coerced
/// value and whether the write succeeded.
pub type OnWriteHook = Box<dyn FnMut(&Value, bool) + Send>;

/// Capability interface shared by [`Metric`] and the memory-tag
/// specialization, per the "avoid deep inheritance" design note: the
/// edge node runtime holds a flat `Vec<Box<dyn Tag>>` rather than a
/// type hierarchy.
pub trait Tag: Send {
    /// The tag's name.
    fn name(&self) -> &str;
    /// The tag's alias (0 if unaliased).
    fn alias(&self) -> u64;
    /// The tag's datatype.
    fn datatype(&self) -> Datatype;
    /// `true` if writes are accepted.
    fn is_writable(&self) -> bool;
    /// `true` if excluded from report-by-exception scans.
    fn rbe_ignore(&self) -> bool;
    /// Performs one read, rotating `previous_value`/`current_value` on
    /// success. Returns whether the read succeeded.
    fn read(&mut self, now_ms: u64) -> bool;
    /// Coerces and applies a raw write. Returns whether it succeeded.
    fn write(&mut self, raw: &RawValue) -> bool;
    /// `true` iff the last read changed the current value.
    fn value_changed(&self) -> bool;
    /// Builds this tag's birth-payload entry.
    fn as_birth_metric(&self) -> payload::Metric;
    /// Builds this tag's report-by-exception payload entry.
    fn as_rbe_metric(&self) -> payload::Metric;
    /// Persists this tag's value, if it is backed by a persistence
    /// file. No-op for plain [`Metric`]s.
    fn save_to_disk(&self) -> crate::error::Result<()> {
        Ok(())
    }
}

impl Tag for Metric {
    fn name(&self) -> &str {
        self.name()
    }
    fn alias(&self) -> u64 {
        self.alias()
    }
    fn datatype(&self) -> Datatype {
        self.datatype()
    }
    fn is_writable(&self) -> bool {
        self.is_writable()
    }
    fn rbe_ignore(&self) -> bool {
        self.rbe_ignore()
    }
    fn read(&mut self, now_ms: u64) -> bool {
        Metric::read(self, now_ms)
    }
    fn write(&mut self, raw: &RawValue) -> bool {
        Metric::write(self, raw)
    }
    fn value_changed(&self) -> bool {
        self.value_changed()
    }
    fn as_birth_metric(&self) -> payload::Metric {
        Metric::as_birth_metric(self)
    }
    fn as_rbe_metric(&self) -> payload::Metric {
        Metric::as_rbe_metric(self)
    }
}

/// One named, typed Sparkplug tag.
///
/// Identity (`name`, `alias`, `datatype`, `disable_alias`, `rbe_ignore`)
/// is fixed at construction. Value state (`current_value`,
/// `previous_value`, `read_timestamp_ms`) mutates on every successful
/// `read()`.
pub struct Metric {
    name: String,
    alias: u64,
    datatype: Datatype,
    disable_alias: bool,
    rbe_ignore: bool,
    writable: bool,
    current_value: Option<Value>,
    previous_value: Option<Value>,
    read_timestamp_ms: u64,
    read_fn: ReadFn,
    write_fn: Option<WriteFn>,
    on_read: Option<OnReadHook>,
    on_write: Option<OnWriteHook>,
}

impl Metric {
    /// Creates a metric with a fixed, already-allocated alias (alias 0
    /// means "unaliased"; the edge node runtime owns monotonic
    /// allocation across its metric set).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        alias: u64,
        datatype: Datatype,
        disable_alias: bool,
        rbe_ignore: bool,
        writable: bool,
        read_fn: ReadFn,
        write_fn: Option<WriteFn>,
    ) -> Self {
        Self {
            name: name.into(),
            alias,
            datatype,
            disable_alias,
            rbe_ignore,
            writable,
            current_value: None,
            previous_value: None,
            read_timestamp_ms: 0,
            read_fn,
            write_fn,
            on_read: None,
            on_write: None,
        }
    }

    /// Installs a hook fired after every `read()`.
    pub fn set_on_read(&mut self, hook: OnReadHook) {
        self.on_read = Some(hook);
    }

    /// Installs a hook fired after every accepted `write()`.
    pub fn set_on_write(&mut self, hook: OnWriteHook) {
        self.on_write = Some(hook);
    }

    /// The metric's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The metric's alias (0 if unaliased).
    pub fn alias(&self) -> u64 {
        self.alias
    }

    /// The metric's datatype.
    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    /// `true` if writes are accepted.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// `true` if this metric is excluded from report-by-exception
    /// scans regardless of whether its value changed.
    pub fn rbe_ignore(&self) -> bool {
        self.rbe_ignore
    }

    /// `true` if this metric always carries `name` on the wire instead
    /// of its alias.
    pub fn disable_alias(&self) -> bool {
        self.disable_alias
    }

    /// The value observed on the most recent successful read.
    pub fn current_value(&self) -> Option<&Value> {
        self.current_value.as_ref()
    }

    /// The value held just prior to the most recent successful read.
    pub fn previous_value(&self) -> Option<&Value> {
        self.previous_value.as_ref()
    }

    /// `true` iff `previous_value != current_value`.
    pub fn value_changed(&self) -> bool {
        self.previous_value != self.current_value
    }

    /// Invokes the read callback with the prior current value. On
    /// success, rotates `previous_value ← prior current`,
    /// `current_value ← new`, stamps `read_timestamp_ms`, and returns
    /// `true`. On failure, state is left unchanged and `false` is
    /// returned. `on_read` fires unconditionally either way.
    pub fn read(&mut self, now_ms: u64) -> bool {
        let result = (self.read_fn)(self.current_value.as_ref());
        let success = match result {
            Ok(new_value) => {
                self.previous_value = self.current_value.take();
                self.current_value = Some(new_value);
                self.read_timestamp_ms = now_ms;
                true
            }
            Err(_) => false,
        };
        if let Some(hook) = self.on_read.as_mut() {
            hook(self.current_value.as_ref(), success);
        }
        success
    }

    /// Coerces `raw` per this metric's datatype and calls the write
    /// callback. Returns `false` immediately, without coercing or
    /// calling the callback, if the metric is not writable.
    pub fn write(&mut self, raw: &RawValue) -> bool {
        if !self.writable {
            return false;
        }
        let coerced = match self.datatype.coerce(raw) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let success = match self.write_fn.as_mut() {
            Some(write_fn) => write_fn(&coerced),
            None => false,
        };
        if let Some(hook) = self.on_write.as_mut() {
            hook(&coerced, success);
        }
        success
    }

    /// Builds this metric's birth-payload entry: always carries `name`;
    /// carries `alias` too when aliasing is not disabled. Null current
    /// values set `is_null` and omit the value oneof.
    pub fn as_birth_metric(&self) -> payload::Metric {
        let mut m = payload::Metric {
            name: Some(self.name.clone()),
            alias: (!self.disable_alias).then_some(self.alias),
            timestamp: Some(self.read_timestamp_ms),
            datatype: Some(self.datatype.code()),
            is_null: None,
            properties: Some(birth_properties(self.writable)),
            value: None,
        };
        self.fill_value(&mut m);
        m
    }

    /// Builds this metric's report-by-exception payload entry: carries
    /// `name` only when aliasing is disabled, else `alias`; no
    /// properties block. Same null-value rule as birth.
    pub fn as_rbe_metric(&self) -> payload::Metric {
        let mut m = payload::Metric {
            name: self.disable_alias.then(|| self.name.clone()),
            alias: (!self.disable_alias).then_some(self.alias),
            timestamp: Some(self.read_timestamp_ms),
            datatype: Some(self.datatype.code()),
            is_null: None,
            properties: None,
            value: None,
        };
        self.fill_value(&mut m);
        m
    }

    fn fill_value(&self, m: &mut payload::Metric) {
        match &self.current_value {
            None => m.is_null = Some(true),
            Some(value) => m.value = Some(wire_metric_value(self.datatype, value)),
        }
    }
}

/// Builds the birth-only `{ readOnly: !writable }` properties block.
fn birth_properties(writable: bool) -> payload::PropertySet {
    payload::PropertySet {
        keys: vec!["readOnly".to_string()],
        types: vec![Datatype::Boolean.code()],
        value: Some(payload::PropertyValue::BooleanValue(!writable)),
    }
}

/// Converts a canonical [`Value`] into the protobuf oneof for its
/// datatype's wire field, reinterpreting signed integers as unsigned
/// two's complement per [`int_to_uint`].
fn wire_metric_value(datatype: Datatype, value: &Value) -> payload::MetricValue {
    match (datatype.wire_field(), value) {
        (WireField::Int, Value::Int(i)) => payload::int_value(WireField::Int, int_to_uint(*i, 32)),
        (WireField::Int, Value::UInt(u)) => payload::int_value(WireField::Int, *u),
        (WireField::Long, Value::Int(i)) => {
            payload::int_value(WireField::Long, int_to_uint(*i, 64))
        }
        (WireField::Long, Value::UInt(u)) => payload::int_value(WireField::Long, *u),
        (WireField::Float, Value::Float(f)) => payload::MetricValue::FloatValue(*f),
        (WireField::Double, Value::Double(d)) => payload::MetricValue::DoubleValue(*d),
        (WireField::Boolean, Value::Boolean(b)) => payload::MetricValue::BooleanValue(*b),
        (WireField::String, Value::Text(s)) => payload::MetricValue::StringValue(s.clone()),
        (WireField::Bytes, Value::Bytes(b)) => payload::MetricValue::BytesValue(b.clone()),
        (field, value) => unreachable!(
            "datatype {datatype:?} (wire field {field:?}) does not match stored value {value:?}"
        ),
    }
}
