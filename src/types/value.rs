use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

/// A single decoded cell of a data record.
///
/// The variants mirror the TPS field types; `Array` wraps repeated elements
/// and `Group` carries the raw bytes of an overlay field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Byte(u8),
    Short(i16),
    UShort(u16),
    /// `None` encodes the all-zero "no date" value.
    Date(Option<NaiveDate>),
    Time(NaiveTime),
    Long(i32),
    ULong(u32),
    Float(f32),
    Double(f64),
    /// Rendered BCD number, e.g. `"-1.23"`.
    Decimal(String),
    Text(String),
    /// Raw bytes: group overlays and, in tolerant mode, unsupported types.
    Bytes(Vec<u8>),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null_date(&self) -> bool {
        matches!(self, Value::Date(None))
    }

    /// Best-effort numeric view, used by emitters for formatting decisions.
    pub fn coerce_to_number(&self) -> Option<f64> {
        match self {
            Value::Byte(v) => Some(*v as f64),
            Value::Short(v) => Some(*v as f64),
            Value::UShort(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            Value::ULong(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }
}
