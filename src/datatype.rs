//! Sparkplug B datatype registry (component C1).
//!
//! Static, total functions over a closed set of datatypes: each one maps
//! to the protobuf wire field it is carried in, and to a coercion rule
//! that turns an inbound wire value into its canonical in-memory form.

use crate::error::{Error, Result};

/// Sparkplug datatypes supported by this edge node.
///
/// This is the common scalar subset enumerated in the specification;
/// `DataSet`, `Template`, and the `*Array` variants from the wider
/// Sparkplug B spec are out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit floating point.
    Float,
    /// 64-bit floating point.
    Double,
    /// Boolean value.
    Boolean,
    /// UTF-8 string.
    String,
    /// Millisecond Unix timestamp, carried as a 64-bit integer.
    DateTime,
    /// Free-form text, carried as a string.
    Text,
    /// UUID, carried as its canonical string form.
    UUID,
    /// Raw byte string.
    Bytes,
    /// Opaque file contents, carried as bytes.
    File,
}

/// The Sparkplug B protobuf `Metric.value` oneof field a datatype is
/// carried in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireField {
    /// `int_value` — used for integers narrower than 64 bits.
    Int,
    /// `long_value` — used for 64-bit integers.
    Long,
    /// `float_value`.
    Float,
    /// `double_value`.
    Double,
    /// `boolean_value`.
    Boolean,
    /// `string_value` — used for string-like datatypes.
    String,
    /// `bytes_value` — used for byte-like datatypes.
    Bytes,
}

impl WireField {
    /// The field name as it appears in the protobuf `Payload.Metric`
    /// message, and in camelCase as it appears in JSON-mapped NCMD
    /// payloads.
    pub fn name(&self) -> &'static str {
        match self {
            WireField::Int => "int_value",
            WireField::Long => "long_value",
            WireField::Float => "float_value",
            WireField::Double => "double_value",
            WireField::Boolean => "boolean_value",
            WireField::String => "string_value",
            WireField::Bytes => "bytes_value",
        }
    }

    /// The camelCase spelling of [`WireField::name`], as produced by
    /// protobuf JSON mappings (e.g. `longValue`).
    pub fn camel_case_name(&self) -> &'static str {
        match self {
            WireField::Int => "intValue",
            WireField::Long => "longValue",
            WireField::Float => "floatValue",
            WireField::Double => "doubleValue",
            WireField::Boolean => "booleanValue",
            WireField::String => "stringValue",
            WireField::Bytes => "bytesValue",
        }
    }
}

/// A coerced, canonical metric value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed integer, widened to `i64` regardless of the metric's
    /// declared bit width (the declared `Datatype` still governs wire
    /// encoding and boundary checks).
    Int(i64),
    /// Unsigned integer, widened to `u64`.
    UInt(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Boolean.
    Boolean(bool),
    /// Any string-like value (String, Text, DateTime-as-text, UUID).
    Text(String),
    /// Any byte-like value (Bytes, File).
    Bytes(Vec<u8>),
}

impl Datatype {
    /// The protobuf wire field this datatype's value is carried in.
    pub fn wire_field(&self) -> WireField {
        match self {
            Datatype::Int8
            | Datatype::Int16
            | Datatype::Int32
            | Datatype::UInt8
            | Datatype::UInt16
            | Datatype::UInt32 => WireField::Int,
            Datatype::Int64 | Datatype::UInt64 | Datatype::DateTime => WireField::Long,
            Datatype::Float => WireField::Float,
            Datatype::Double => WireField::Double,
            Datatype::Boolean => WireField::Boolean,
            Datatype::String | Datatype::Text | Datatype::UUID => WireField::String,
            Datatype::Bytes | Datatype::File => WireField::Bytes,
        }
    }

    /// The Sparkplug B datatype code used in the `Metric.datatype`
    /// wire field, per the official Sparkplug B numbering.
    pub fn code(&self) -> u32 {
        match self {
            Datatype::Int8 => 1,
            Datatype::Int16 => 2,
            Datatype::Int32 => 3,
            Datatype::Int64 => 4,
            Datatype::UInt8 => 5,
            Datatype::UInt16 => 6,
            Datatype::UInt32 => 7,
            Datatype::UInt64 => 8,
            Datatype::Float => 9,
            Datatype::Double => 10,
            Datatype::Boolean => 11,
            Datatype::String => 12,
            Datatype::DateTime => 13,
            Datatype::Text => 14,
            Datatype::UUID => 15,
            Datatype::Bytes => 17,
            Datatype::File => 18,
        }
    }

    /// `true` for numeric datatypes (everything but Boolean, the
    /// string-likes, and the byte-likes).
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Datatype::Int8
                | Datatype::Int16
                | Datatype::Int32
                | Datatype::Int64
                | Datatype::UInt8
                | Datatype::UInt16
                | Datatype::UInt32
                | Datatype::UInt64
                | Datatype::Float
                | Datatype::Double
        )
    }

    /// `true` if the wire field this datatype uses is unsigned
    /// (`int_value`/`long_value` are both declared `uint32`/`uint64` in
    /// the Sparkplug B schema, so signed datatypes must be reinterpreted
    /// via [`int_to_uint`] before being written to the wire).
    pub fn unsigned_bit_width(&self) -> Option<u32> {
        match self {
            Datatype::Int8 | Datatype::Int16 | Datatype::Int32 => Some(32),
            Datatype::Int64 => Some(64),
            _ => None,
        }
    }

    /// Bit width used to validate inbound signed integers before they
    /// are accepted for this datatype. `None` for non-integer datatypes.
    fn signed_bit_width(&self) -> Option<u32> {
        match self {
            Datatype::Int8 => Some(8),
            Datatype::Int16 => Some(16),
            Datatype::Int32 => Some(32),
            Datatype::Int64 | Datatype::DateTime => Some(64),
            Datatype::UInt8 => Some(8),
            Datatype::UInt16 => Some(16),
            Datatype::UInt32 => Some(32),
            Datatype::UInt64 => Some(64),
            _ => None,
        }
    }

    /// Coerces a raw integer into this datatype's canonical value,
    /// rejecting values whose bit width exceeds the declared field.
    pub fn coerce_int(&self, raw: i64) -> Result<Value> {
        let width = self.signed_bit_width().ok_or_else(|| {
            Error::Write {
                metric: String::new(),
                reason: format!("{self:?} does not accept integer values"),
            }
        })?;

        let unsigned = matches!(
            self,
            Datatype::UInt8 | Datatype::UInt16 | Datatype::UInt32 | Datatype::UInt64
        );

        if unsigned {
            if raw < 0 {
                return Err(Error::Write {
                    metric: String::new(),
                    reason: format!("{self:?} cannot hold a negative value ({raw})"),
                });
            }
            if width < 64 && (raw as u64) >= (1u64 << width) {
                return Err(Error::Write {
                    metric: String::new(),
                    reason: format!("{raw} exceeds {width}-bit range for {self:?}"),
                });
            }
            return Ok(Value::UInt(raw as u64));
        }

        if width < 64 {
            let min = -(1i64 << (width - 1));
            let max = (1i64 << (width - 1)) - 1;
            if raw < min || raw > max {
                return Err(Error::Write {
                    metric: String::new(),
                    reason: format!("{raw} exceeds {width}-bit signed range for {self:?}"),
                });
            }
        }
        Ok(Value::Int(raw))
    }

    /// Coerces a raw wire value into this datatype's canonical form.
    /// Boolean accepts only literal booleans; string-likes accept any
    /// textual value.
    pub fn coerce(&self, raw: &RawValue) -> Result<Value> {
        match (self, raw) {
            (_, RawValue::Int(i)) if self.is_number() && *self != Datatype::Float && *self != Datatype::Double => {
                self.coerce_int(*i)
            }
            (Datatype::Float, RawValue::Float(f)) => Ok(Value::Float(*f as f32)),
            (Datatype::Float, RawValue::Int(i)) => Ok(Value::Float(*i as f32)),
            (Datatype::Double, RawValue::Float(f)) => Ok(Value::Double(*f)),
            (Datatype::Double, RawValue::Int(i)) => Ok(Value::Double(*i as f64)),
            (Datatype::Boolean, RawValue::Bool(b)) => Ok(Value::Boolean(*b)),
            (Datatype::Boolean, _) => Err(Error::Write {
                metric: String::new(),
                reason: "Boolean accepts only true/false".into(),
            }),
            (Datatype::String | Datatype::Text | Datatype::UUID, RawValue::Text(s)) => {
                Ok(Value::Text(s.clone()))
            }
            (Datatype::Bytes | Datatype::File, RawValue::Bytes(b)) => Ok(Value::Bytes(b.clone())),
            (dt, _) => Err(Error::Write {
                metric: String::new(),
                reason: format!("value does not match datatype {dt:?}"),
            }),
        }
    }
}

impl PartialEq<Datatype> for &Datatype {
    fn eq(&self, other: &Datatype) -> bool {
        *self == other
    }
}

/// An untyped wire value prior to datatype-specific coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// An integer literal (sign and width validated during coercion).
    Int(i64),
    /// A floating point literal.
    Float(f64),
    /// A boolean literal.
    Bool(bool),
    /// Any textual value.
    Text(String),
    /// Any byte value.
    Bytes(Vec<u8>),
}

/// Reinterprets a signed integer as its unsigned two's-complement
/// representation modulo `2^bits`, matching the Sparkplug B wire
/// encoding for `int_value`/`long_value` (both declared `uint32`/
/// `uint64` in the schema).
///
/// `bits` must be 32 or 64.
pub fn int_to_uint(value: i64, bits: u32) -> u64 {
    debug_assert!(bits == 32 || bits == 64);
    if bits == 32 {
        (value as i32 as u32) as u64
    } else {
        value as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_field_narrow_ints_use_int_value() {
        assert_eq!(Datatype::Int8.wire_field(), WireField::Int);
        assert_eq!(Datatype::UInt32.wire_field(), WireField::Int);
    }

    #[test]
    fn wire_field_wide_ints_use_long_value() {
        assert_eq!(Datatype::Int64.wire_field(), WireField::Long);
        assert_eq!(Datatype::UInt64.wire_field(), WireField::Long);
        assert_eq!(Datatype::DateTime.wire_field(), WireField::Long);
    }

    #[test]
    fn wire_field_string_likes() {
        assert_eq!(Datatype::String.wire_field(), WireField::String);
        assert_eq!(Datatype::Text.wire_field(), WireField::String);
        assert_eq!(Datatype::UUID.wire_field(), WireField::String);
    }

    #[test]
    fn coerce_int_rejects_out_of_range() {
        assert!(Datatype::Int8.coerce_int(200).is_err());
        assert!(Datatype::Int8.coerce_int(-100).is_ok());
        assert!(Datatype::UInt8.coerce_int(-1).is_err());
        assert!(Datatype::UInt8.coerce_int(255).is_ok());
        assert!(Datatype::UInt8.coerce_int(256).is_err());
    }

    #[test]
    fn coerce_int64_accepts_full_range() {
        assert!(Datatype::Int64.coerce_int(i64::MIN).is_ok());
        assert!(Datatype::Int64.coerce_int(i64::MAX).is_ok());
    }

    #[test]
    fn boolean_only_accepts_bool() {
        assert!(Datatype::Boolean.coerce(&RawValue::Bool(true)).is_ok());
        assert!(Datatype::Boolean.coerce(&RawValue::Int(1)).is_err());
        assert!(Datatype::Boolean.coerce(&RawValue::Text("true".into())).is_err());
    }

    #[test]
    fn string_accepts_any_text() {
        let v = Datatype::String.coerce(&RawValue::Text("hello".into())).unwrap();
        assert_eq!(v, Value::Text("hello".into()));
    }

    #[test]
    fn int_to_uint_is_twos_complement_mod_2n() {
        assert_eq!(int_to_uint(-1, 32), u32::MAX as u64);
        assert_eq!(int_to_uint(-1, 64), u64::MAX);
        assert_eq!(int_to_uint(42, 32), 42);
        assert_eq!(int_to_uint(i32::MIN as i64, 32), 1u64 << 31);
    }

    #[test]
    fn code_matches_sparkplug_b_numbering() {
        assert_eq!(Datatype::Int8.code(), 1);
        assert_eq!(Datatype::UInt64.code(), 8);
        assert_eq!(Datatype::Boolean.code(), 11);
        assert_eq!(Datatype::String.code(), 12);
    }

    #[test]
    fn unsigned_bit_width_reported_only_for_signed_ints() {
        assert_eq!(Datatype::Int32.unsigned_bit_width(), Some(32));
        assert_eq!(Datatype::Int64.unsigned_bit_width(), Some(64));
        assert_eq!(Datatype::UInt32.unsigned_bit_width(), None);
        assert_eq!(Datatype::Boolean.unsigned_bit_width(), None);
    }
}
